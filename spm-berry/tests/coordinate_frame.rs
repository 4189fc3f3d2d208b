use ndarray::Array3;
use proptest::prelude::*;
use spm_berry::data::morph_3d::{binary_dilation, bounding_box, occupancy, Connectivity};
use spm_berry::frame::{crop, physical_center, recenter_origin, CropOptions};
use spm_berry::{Geometry, GridAttr, Mat3, Vec3, Volume};

const N: usize = 12;

fn make_rotation(ax: f64, ay: f64, az: f64) -> Mat3 {
    let (cx, sx) = (ax.cos(), ax.sin());
    let (cy, sy) = (ay.cos(), ay.sin());
    let (cz, sz) = (az.cos(), az.sin());

    #[rustfmt::skip]
    let rz = Mat3::new(
        cz, -sz, 0.0,
        sz, cz, 0.0,
        0.0, 0.0, 1.0,
    );
    #[rustfmt::skip]
    let ry = Mat3::new(
        cy, 0.0, sy,
        0.0, 1.0, 0.0,
        -sy, 0.0, cy,
    );
    #[rustfmt::skip]
    let rx = Mat3::new(
        1.0, 0.0, 0.0,
        0.0, cx, -sx,
        0.0, sx, cx,
    );
    rx * ry * rz
}

fn connectivity(k: u8) -> Connectivity {
    match k {
        0 => Connectivity::Face,
        1 => Connectivity::Edge,
        _ => Connectivity::Vertex,
    }
}

proptest! {
    #[test]
    fn test_crop_origin_matches_source_position(
        o in prop::array::uniform3(-100.0f64..100.0),
        s in prop::array::uniform3(0.1f64..5.0),
        a in prop::array::uniform3(-3.14f64..3.14),
        at in prop::array::uniform3(0usize..N),
        margin in 0usize..4,
        dilation in 0usize..3,
        conn in 0u8..3,
    ) {
        let geometry = Geometry::new(
            Vec3::from(o),
            Vec3::from(s),
            make_rotation(a[0], a[1], a[2]),
        ).unwrap();
        let image = Volume::new(Array3::from_elem((N, N, N), 1.0f32), geometry).unwrap();
        let mut m = Array3::<f32>::zeros((N, N, N));
        m[(at[0], at[1], at[2])] = 3.0;
        let mask = Volume::new(m, geometry).unwrap();

        let opts = CropOptions::new(3)
            .with_margin(margin)
            .with_dilation(dilation)
            .with_connectivity(connectivity(conn));
        let res = crop(&image, &mask, &opts).unwrap();

        // 新原点即原影像中截取起点的物理坐标.
        let expected = image.index_to_physical(res.padded.start);
        prop_assert!((res.origin() - expected).norm() < 1e-9);
        // 裁剪结果中任意体素的物理坐标与原影像中对应体素一致.
        let (dz, dy, dx) = res.volume.shape();
        let last = (dz - 1, dy - 1, dx - 1);
        let src = (
            res.padded.start.0 + last.0,
            res.padded.start.1 + last.1,
            res.padded.start.2 + last.2,
        );
        let a = res.volume.index_to_physical(last);
        let b = image.index_to_physical(src);
        prop_assert!((a - b).norm() < 1e-9);

        // 截取区间包含膨胀后的占据区域和外扩量 (截断到数组范围内).
        let occ = occupancy(mask.data(), 3);
        let dilated = binary_dilation(occ.view(), connectivity(conn), dilation);
        let bbox = bounding_box(dilated.view()).unwrap();
        let lo = |v: usize| v.saturating_sub(margin);
        let hi = |min: usize, max: usize| (max + margin).max(min + 1).min(N);
        prop_assert_eq!(res.padded.start, (lo(bbox.min.0), lo(bbox.min.1), lo(bbox.min.2)));
        prop_assert_eq!(
            res.padded.end,
            (
                hi(bbox.min.0, bbox.max.0),
                hi(bbox.min.1, bbox.max.1),
                hi(bbox.min.2, bbox.max.2),
            )
        );
    }

    #[test]
    fn test_recenter_onto_own_frame_is_identity(
        o in prop::array::uniform3(-100.0f64..100.0),
        s in prop::array::uniform3(0.1f64..5.0),
        a in prop::array::uniform3(-3.14f64..3.14),
        n in prop::array::uniform3(1usize..20),
    ) {
        let geometry = Geometry::new(
            Vec3::from(o),
            Vec3::from(s),
            make_rotation(a[0], a[1], a[2]),
        ).unwrap();
        let v = Volume::new(Array3::<f32>::zeros((n[0], n[1], n[2])), geometry).unwrap();

        let o = recenter_origin(&v, &geometry).unwrap();
        prop_assert!((o - geometry.origin()).norm() < 1e-9);

        // 重定位后, 网格中心落在参考网格 "同尺寸中心" 处.
        let moved = v.clone().with_origin(Vec3::new(7.0, -3.0, 2.0));
        let back = recenter_origin(&moved, &geometry).unwrap();
        let centered = moved.clone().with_origin(back);
        prop_assert!((physical_center(&centered) - physical_center(&v)).norm() < 1e-9);
    }
}

#[test]
fn test_axis_order_is_explicit() {
    // 仅沿数组 x 轴 (最快变化轴) 有非单位 spacing.
    let g = Geometry::new(Vec3::zeros(), Vec3::new(2.0, 1.0, 1.0), Mat3::identity()).unwrap();
    let image = Volume::new(Array3::from_elem((10, 10, 20), 1.0f32), g).unwrap();
    let mut m = Array3::<f32>::zeros((10, 10, 20));
    m[(5, 5, 15)] = 1.0;
    let mask = Volume::new(m, g).unwrap();

    let res = crop(&image, &mask, &CropOptions::new(1).with_dilation(0).with_margin(0)).unwrap();
    assert_eq!(res.padded.start, (5, 5, 15));
    assert_eq!(res.origin(), &Vec3::new(30.0, 5.0, 5.0));
}

//! 运行结果.

use std::io::{self, Write};

use spm_berry::pipeline::PipelineOutcome;
use spm_berry::validate::ToSpace;

/// 将 `outcome` 写进 `w` 中.
pub fn describe_into<W: Write>(o: &PipelineOutcome, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn xyz(v: &spm_berry::Vec3) -> String {
        format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
    }

    match o.to_space {
        ToSpace::Mni => writeln!(w, "Resliced brain image saved in MNI space at:")?,
        ToSpace::Image => writeln!(w, "Resliced field maps and atlases saved in image space at:")?,
    }
    for p in o.outputs.iter() {
        writeln!(w, "{S4}{}", p.display())?;
    }
    writeln!(w, "Crop origin (image space): {}", xyz(&o.crop_origin))?;
    write!(w, "Recentered origin: {}", xyz(&o.recentered_origin))?;
    if !o.warnings.is_empty() {
        writeln!(w)?;
        write!(w, "Warnings: {}", o.warnings.len())?;
    }
    Ok(())
}

/// 打印运行结果.
pub fn report(outcome: &PipelineOutcome) -> io::Result<()> {
    let mut out = io::stdout().lock();
    utils::sep_to(&mut out)?;
    describe_into(outcome, &mut out)?;
    writeln!(out)?;
    utils::sep_to(&mut out)
}

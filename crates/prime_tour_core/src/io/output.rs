use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::{Result, Tour};

pub const PATH_HEADER: &str = "Path";

/// Writes `Path` followed by one city index per line. `None` writes stdout.
pub fn write_tour(path: Option<&Path>, tour: &Tour) -> Result<()> {
    match path {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write_to(&mut out, tour)?;
            out.flush()?;
            log::info!("output: wrote {} entries to {}", tour.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_to(&mut out, tour)?;
            out.flush()?;
        }
    }
    Ok(())
}

pub fn write_to<W: Write>(out: &mut W, tour: &Tour) -> io::Result<()> {
    writeln!(out, "{PATH_HEADER}")?;
    for city in tour.iter() {
        writeln!(out, "{city}")?;
    }
    Ok(())
}

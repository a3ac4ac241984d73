use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use flate2::bufread::GzDecoder;

use crate::error::{Error, Result};

pub fn download_and_decompress(url: &str, destination: &Path) -> Result<()> {
    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(Error::Corpus(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    write_atomically(GzDecoder::new(BufReader::new(response)), destination)
}

/// Streams `reader` into a `.part` sibling of `destination` and renames it
/// into place once the copy completes. A failed copy leaves nothing behind.
fn write_atomically<R: Read>(mut reader: R, destination: &Path) -> Result<()> {
    let partial = partial_path(destination);

    let written = File::create(&partial).and_then(|mut file| {
        io::copy(&mut reader, &mut file)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }

    fs::rename(&partial, destination)?;
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub const OUTPUT_DIR: &str = ".terraform";
pub const OUTPUT_FILE: &str = "main.tf";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Could not create directory {0}: {1}")]
    DirectoryError(String, String),

    #[error("Could not write {0}: {1}")]
    WriteError(String, String),
}

/// Writes `contents` to `<service_path>/.terraform/main.tf`, replacing any
/// previous file. The text is staged in a temporary file in the same
/// directory and renamed into place, so readers never observe a partial file.
pub fn write(service_path: &Path, contents: &str) -> Result<PathBuf, Error> {
    let directory = service_path.join(OUTPUT_DIR);
    match fs::create_dir_all(&directory) {
        Ok(_) => (),
        Err(error) => {
            return Err(Error::DirectoryError(
                directory.display().to_string(),
                error.to_string(),
            ))
        }
    }

    let path = directory.join(OUTPUT_FILE);
    let write_error =
        |error: std::io::Error| Error::WriteError(path.display().to_string(), error.to_string());

    let mut staged = NamedTempFile::new_in(&directory).map_err(write_error)?;
    staged.write_all(contents.as_bytes()).map_err(write_error)?;
    staged.flush().map_err(write_error)?;
    staged.persist(&path).map_err(|error| write_error(error.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote terraform");
    return Ok(path);
}

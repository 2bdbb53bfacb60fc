//! Code regarding file input (reading `.izm` source files and routine
//! listings) and output (writing generated listings) actions.
//!
//! ## Input
//! The source is either a file, or the standard input when the path is `-`.
//!
//! ## Output
//! The listing of a compiled program can be written to a file of choice;
//! missing parent directories are created.

/// Path which stands for the standard input.
pub const STDIN_PATH: &str = "-";

pub mod input {
    use std::{
        fs,
        io::{self, Read},
        path::Path,
    };

    use super::STDIN_PATH;

    #[derive(Debug, Clone)]
    pub struct SourceFile {
        name: String,
        content: String,
    }

    impl SourceFile {
        pub fn new(name: &str, content: &str) -> Self {
            Self {
                name: name.to_owned(),
                content: content.to_owned(),
            }
        }

        /// Load the file at `path`, or the standard input for `-`.
        pub fn load(path: &Path) -> io::Result<Self> {
            if path.as_os_str() == STDIN_PATH {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;

                return Ok(Self {
                    name: String::from("<stdin>"),
                    content,
                });
            }

            Ok(Self {
                name: path.to_string_lossy().into_owned(),
                content: fs::read_to_string(path)?,
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn content(&self) -> &str {
            &self.content
        }
    }
}

pub mod output {
    use std::{
        fs,
        io::{self, Write},
        path::{Path, PathBuf},
    };

    pub struct OutputFile {
        path: PathBuf,
        content: String,
    }

    impl OutputFile {
        pub const fn new(path: PathBuf, content: String) -> Self {
            Self { path, content }
        }
    }

    pub fn generate(output_file: &OutputFile) -> io::Result<()> {
        ensure_parent_dir_exists(&output_file.path)?;

        fs::File::create(&output_file.path)?.write_all(output_file.content.as_bytes())
    }

    fn ensure_parent_dir_exists(path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                fs::create_dir_all(parent)
            }
            _ => Ok(()),
        }
    }
}

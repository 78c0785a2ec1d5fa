//! Input/output path rules.

use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("no input file given (use --input)")]
    MissingInput,

    #[error("no output file given (use --output)")]
    MissingOutput,

    #[error("input file {} does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("input {} is not a regular file", .0.display())]
    InputNotFile(PathBuf),

    #[error("output file {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("input and output are the same file: {}", .0.display())]
    SameFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Check the command line paths. An input without an extension gets `.ts`.
pub fn resolve(input: Option<&Path>, output: Option<&Path>) -> Result<Paths, PathError> {
    let input = input.ok_or(PathError::MissingInput)?;
    let output = output.ok_or(PathError::MissingOutput)?;

    let input = if input.extension().is_none() {
        input.with_extension("ts")
    } else {
        input.to_path_buf()
    };

    if !input.exists() {
        return Err(PathError::InputNotFound(input));
    }
    if !input.is_file() {
        return Err(PathError::InputNotFile(input));
    }
    if input == output || same_file(&input, output) {
        return Err(PathError::SameFile(input));
    }
    if output.exists() {
        return Err(PathError::OutputExists(output.to_path_buf()));
    }

    Ok(Paths {
        input,
        output: output.to_path_buf(),
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments() {
        assert_eq!(
            resolve(None, Some(Path::new("out.js"))),
            Err(PathError::MissingInput)
        );
        assert_eq!(
            resolve(Some(Path::new("in.ts")), None),
            Err(PathError::MissingOutput)
        );
    }

    /// A bare name is looked up with a `.ts` extension.
    #[test]
    fn appends_ts_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.ts"), "let a;").unwrap();
        let output = dir.path().join("main.js");
        let paths = resolve(Some(&dir.path().join("main")), Some(&output)).unwrap();
        assert_eq!(paths.input, dir.path().join("main.ts"));
        assert_eq!(paths.output, output);
    }

    #[test]
    fn rejects_bad_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.ts");
        let existing = dir.path().join("b.js");
        std::fs::write(&input, "").unwrap();
        std::fs::write(&existing, "").unwrap();

        assert_eq!(
            resolve(Some(&dir.path().join("missing.ts")), Some(&existing)),
            Err(PathError::InputNotFound(dir.path().join("missing.ts")))
        );
        let folder = dir.path().join("folder.ts");
        std::fs::create_dir(&folder).unwrap();
        assert_eq!(
            resolve(Some(&folder), Some(&dir.path().join("c.js"))),
            Err(PathError::InputNotFile(folder.clone()))
        );
        assert_eq!(
            resolve(Some(&input), Some(&existing)),
            Err(PathError::OutputExists(existing.clone()))
        );
        assert_eq!(
            resolve(Some(&input), Some(&input)),
            Err(PathError::SameFile(input.clone()))
        );
    }
}

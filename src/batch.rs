use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{error, info};

use crate::error::ConvertError;
use crate::formats::SourceFormat;
use crate::options::ConvertOptions;
use crate::{ConversionReport, convert_statement_pdf, write_tabular};

pub const OUTPUT_SUFFIX: &str = "_converted.xlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: SourceFormat,
    /// Present for statement PDFs only.
    pub report: Option<ConversionReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub input: PathBuf,
    pub message: String,
    /// The document was readable but held no data to write.
    pub no_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: Vec<FileOutcome>,
    pub failed: Vec<FileFailure>,
}

impl BatchSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }
}

/// `<output_dir>/<stem>_converted.xlsx`
#[must_use]
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |stem| stem.to_string_lossy());
    output_dir.join(format!("{stem}{OUTPUT_SUFFIX}"))
}

/// Converts one file by extension into `<output_dir>/<stem>_converted.xlsx`.
pub fn convert_file(
    input: &Path,
    output_dir: &Path,
    options: &ConvertOptions,
) -> Result<FileOutcome, ConvertError> {
    let format = SourceFormat::from_path(input)?;
    let output = output_path_for(input, output_dir);

    let report = match format.tabular_converter() {
        Some(convert) => {
            let table = convert(input)?;
            if table.rows.is_empty() {
                return Err(ConvertError::EmptyInput(input.display().to_string()));
            }
            let rows = write_tabular(&output, &table, &options.sheet_name)?;
            info!(input = %input.display(), rows, "file converted");
            None
        }
        None => Some(convert_statement_pdf(input, &output, options)?),
    };

    Ok(FileOutcome {
        input: input.to_path_buf(),
        output,
        format,
        report,
    })
}

fn failure(input: &Path, error: &ConvertError) -> FileFailure {
    FileFailure {
        input: input.to_path_buf(),
        message: error.to_string(),
        no_data: error.is_no_data(),
    }
}

/// Converts every input, one file per worker. A failing file is recorded and
/// never stops the others; results keep input order. Inputs whose output name
/// repeats an earlier input's are failed instead of overwriting it.
#[must_use]
pub fn convert_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &ConvertOptions,
    jobs: usize,
) -> BatchSummary {
    let mut seen = HashSet::new();
    let collides = inputs
        .iter()
        .map(|input| !seen.insert(output_path_for(input, output_dir)))
        .collect::<Vec<_>>();

    let run_one = |(input, collides): (&PathBuf, &bool)| -> Result<FileOutcome, FileFailure> {
        if *collides {
            return Err(FileFailure {
                input: input.clone(),
                message: format!(
                    "output '{}' is already produced by another input",
                    output_path_for(input, output_dir).display()
                ),
                no_data: false,
            });
        }
        convert_file(input, output_dir, options).map_err(|error| {
            error!(input = %input.display(), %error, "conversion failed");
            failure(input, &error)
        })
    };

    let results = match ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| {
            inputs
                .par_iter()
                .zip(collides.par_iter())
                .map(run_one)
                .collect::<Vec<_>>()
        }),
        Err(build_error) => {
            error!(%build_error, "worker pool unavailable; converting sequentially");
            inputs.iter().zip(&collides).map(run_one).collect()
        }
    };

    let mut summary = BatchSummary::default();
    for result in results {
        match result {
            Ok(outcome) => summary.converted.push(outcome),
            Err(failure) => summary.failed.push(failure),
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::{convert_batch, convert_file, output_path_for};
    use crate::error::ConvertError;
    use crate::options::ConvertOptions;

    #[test]
    fn output_name_uses_stem_and_suffix() {
        let path = output_path_for(Path::new("/in/March 2024.pdf"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/March 2024_converted.xlsx"));
    }

    #[test]
    fn unsupported_extension_fails_without_output() {
        let dir = tempdir().expect("tempdir should be created");
        let input = dir.path().join("notes.docx");
        fs::write(&input, "x").expect("fixture");

        let err = convert_file(&input, dir.path(), &ConvertOptions::default())
            .expect_err("docx is not supported");
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
        assert!(!output_path_for(&input, dir.path()).exists());
    }

    #[test]
    fn batch_continues_after_failures_and_keeps_order() {
        let dir = tempdir().expect("tempdir should be created");
        let good = dir.path().join("good.csv");
        let empty = dir.path().join("empty.csv");
        let other = dir.path().join("other.tsv");
        fs::write(&good, "A,B\n1,2\n").expect("fixture");
        fs::write(&empty, "A,B\n").expect("fixture");
        fs::write(&other, "A\tB\n3\t4\n").expect("fixture");

        let out = dir.path().join("out");
        fs::create_dir(&out).expect("output dir");
        let inputs = vec![good.clone(), empty.clone(), other.clone()];
        let summary = convert_batch(&inputs, &out, &ConvertOptions::default(), 2);

        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary
                .converted
                .iter()
                .map(|outcome| outcome.input.clone())
                .collect::<Vec<_>>(),
            vec![good, other]
        );
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].input, empty);
        assert!(summary.failed[0].no_data);
        assert!(out.join("good_converted.xlsx").exists());
        assert!(!out.join("empty_converted.xlsx").exists());
    }

    #[test]
    fn colliding_output_names_fail_the_later_input() {
        let dir = tempdir().expect("tempdir should be created");
        let first = dir.path().join("a").join("same.csv");
        let second = dir.path().join("b").join("same.csv");
        for path in [&first, &second] {
            fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
            fs::write(path, "A\n1\n").expect("fixture");
        }

        let summary = convert_batch(
            &[first.clone(), second.clone()],
            dir.path(),
            &ConvertOptions::default(),
            1,
        );
        assert_eq!(summary.converted.len(), 1);
        assert_eq!(summary.converted[0].input, first);
        assert_eq!(summary.failed[0].input, second);
    }
}

use crate::compiler::Lexicon;
use crate::corpus::load_file;
use crate::error::{CodegenError, Result};
use smol_str::SmolStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use super::CodeGenerator;
use super::templates::Render;

/// Outcome of a generation run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Files written, common files first, then per document in input order
    pub written: Vec<PathBuf>,
    /// Documents that produced no artifacts
    pub empty: Vec<SmolStr>,
    /// Documents skipped as malformed
    pub malformed: Vec<(PathBuf, CodegenError)>,
    /// Every compiled document, in input order
    pub lexicons: Vec<Lexicon>,
}

impl RunReport {
    fn record(&mut self, path: &Path, outcome: Outcome) {
        match outcome {
            Outcome::Compiled { lexicon, written } => {
                if written.is_empty() {
                    self.empty.push(lexicon.nsid.clone());
                }
                self.written.extend(written);
                self.lexicons.push(lexicon);
            }
            Outcome::Malformed(err) => self.malformed.push((path.to_path_buf(), err)),
        }
    }
}

enum Outcome {
    Compiled {
        lexicon: Lexicon,
        written: Vec<PathBuf>,
    },
    Malformed(CodegenError),
}

/// Write a file, creating parent directories and replacing whatever was there
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CodegenError::io_at(e, parent))?;
    }
    fs::write(path, contents).map_err(|e| CodegenError::io_at(e, path))
}

impl<R: Render> CodeGenerator<R> {
    /// Write the common support files into `out`, unless this generator already did
    ///
    /// Returns the paths written, which is empty on every call after the first.
    pub fn write_common(&self, out: &Path) -> Result<Vec<PathBuf>> {
        let mut done = self
            .common_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if done.contains(out) {
            return Ok(Vec::new());
        }
        let mut written = Vec::new();
        for file in self.generate_common()? {
            let path = out.join(&file.path);
            write_file(&path, &file.contents)?;
            tracing::debug!(path = %path.display(), "wrote common file");
            written.push(path);
        }
        done.insert(out.to_path_buf());
        Ok(written)
    }

    /// Write every artifact of one lexicon under `out`
    ///
    /// The common files are written first if they have not been yet. A
    /// lexicon with no recognised definitions writes nothing.
    pub fn write_lexicon(&self, lexicon: &Lexicon, out: &Path) -> Result<Vec<PathBuf>> {
        self.write_common(out)?;
        let files = self.generate(lexicon)?;
        if files.is_empty() {
            tracing::info!(nsid = %lexicon.nsid, "no recognised definitions, nothing generated");
            return Ok(Vec::new());
        }
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let path = out.join(&file.path);
            write_file(&path, &file.contents)?;
            tracing::debug!(path = %path.display(), "wrote file");
            written.push(path);
        }
        tracing::info!(nsid = %lexicon.nsid, files = written.len(), "generated");
        Ok(written)
    }

    /// Load, compile and write a batch of documents
    ///
    /// With `jobs > 1` documents are spread over that many worker threads;
    /// the report is in input order either way. Malformed documents are
    /// collected in the report. The first I/O error stops the run once the
    /// documents already in flight are done.
    pub fn write_documents(&self, paths: &[PathBuf], out: &Path, jobs: usize) -> Result<RunReport> {
        let mut report = RunReport::default();
        report.written.extend(self.write_common(out)?);

        if jobs <= 1 || paths.len() <= 1 {
            for path in paths {
                report.record(path, self.process(path, out)?);
            }
            return Ok(report);
        }

        for (path, slot) in paths.iter().zip(self.process_parallel(paths, out, jobs)) {
            // unclaimed slots only follow a failure
            let Some(outcome) = slot else { break };
            report.record(path, outcome?);
        }
        Ok(report)
    }

    fn process(&self, path: &Path, out: &Path) -> Result<Outcome> {
        let lexicon = match load_file(path) {
            Ok(lexicon) => lexicon,
            Err(err) if err.is_document_error() => {
                tracing::warn!(path = %path.display(), error = %err, "skipping malformed lexicon");
                return Ok(Outcome::Malformed(err));
            }
            Err(err) => return Err(err),
        };
        let written = self.write_lexicon(&lexicon, out)?;
        Ok(Outcome::Compiled { lexicon, written })
    }

    fn process_parallel(
        &self,
        paths: &[PathBuf],
        out: &Path,
        jobs: usize,
    ) -> Vec<Option<Result<Outcome>>> {
        let cursor = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let mut slots: Vec<Option<Result<Outcome>>> =
            std::iter::repeat_with(|| None).take(paths.len()).collect();

        thread::scope(|scope| {
            let count = jobs.min(paths.len());
            let mut workers = Vec::with_capacity(count);
            for _ in 0..count {
                workers.push(scope.spawn(|| {
                    let mut done = Vec::new();
                    while !failed.load(Ordering::Relaxed) {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = paths.get(index) else { break };
                        let outcome = self.process(path, out);
                        if outcome.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        done.push((index, outcome));
                    }
                    done
                }));
            }

            for worker in workers {
                match worker.join() {
                    Ok(done) => {
                        for (index, outcome) in done {
                            slots[index] = Some(outcome);
                        }
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });
        slots
    }
}

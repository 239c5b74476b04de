use crate::models::DocumentRecord;
use crate::passport_parser::{DocumentFormat, PassportParser};
use crate::utils::PassportError;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub type BatchResult = Vec<(PathBuf, Result<DocumentRecord, PassportError>)>;

/// Supported documents directly inside `directory`, sorted by path.
pub fn collect_documents(directory: &Path) -> Result<Vec<PathBuf>, PassportError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(directory)
        .map_err(|e| {
            PassportError::IoError(format!(
                "Failed to read directory {}: {}",
                directory.display(),
                e
            ))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && DocumentFormat::from_path(path).is_ok())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Parse the given documents on a pool of `workers` threads.
///
/// Results come back in input order. A failing document only fails its own
/// entry.
pub fn parse_paths(
    paths: &[PathBuf],
    parser: &PassportParser,
    workers: usize,
) -> Result<BatchResult, PassportError> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.clamp(1, paths.len()))
        .build()
        .map_err(|e| PassportError::ConfigError(format!("Failed to build worker pool: {}", e)))?;

    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result = parser.parse(path);
                if let Err(e) = &result {
                    log::warn!("{}: {}", path.display(), e);
                }
                (path.clone(), result)
            })
            .collect()
    }))
}

/// Parse every jpg/jpeg/png/pdf file in a directory.
pub fn parse_directory(
    directory: &Path,
    parser: &PassportParser,
    workers: usize,
) -> Result<BatchResult, PassportError> {
    let paths = collect_documents(directory)?;
    log::info!(
        "Parsing {} documents from {} with {} workers",
        paths.len(),
        directory.display(),
        workers.max(1)
    );
    parse_paths(&paths, parser, workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::processing::ocr::{OcrBackend, OcrRequest};
    use image::{GrayImage, Luma};

    struct EchoBackend;

    impl OcrBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        fn recognize(&self, _png: &[u8], request: &OcrRequest) -> Result<String, PassportError> {
            if request.whitelist.is_some() {
                return Ok(String::new());
            }
            Ok("SURNAME\nNASSIPKHAN\nGIVEN NAMES\nTOLEU\nPASSPORT N12345678".to_string())
        }
    }

    fn write_image(dir: &Path, name: &str) {
        GrayImage::from_pixel(40, 50, Luma([200]))
            .save_with_format(dir.join(name), image::ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_collect_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.PDF"), b"%PDF").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        fs::write(dir.path().join("a.jpg"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = collect_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PDF"]);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let parser = PassportParser::new(ParserConfig::default()).unwrap();
        let err = parse_directory(Path::new("/nonexistent/dir"), &parser, 2).unwrap_err();
        assert!(matches!(err, PassportError::IoError(_)));
    }

    #[test]
    fn test_results_keep_path_order_and_isolate_failures() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.png", "2.png", "4.png", "5.png"] {
            write_image(dir.path(), name);
        }
        // Not a decodable image
        fs::write(dir.path().join("3.png"), b"garbage").unwrap();

        let parser = PassportParser::new(ParserConfig::default())
            .unwrap()
            .with_backend(EchoBackend);
        let results = parse_directory(dir.path(), &parser, 3).unwrap();

        let names: Vec<String> = results
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.png", "2.png", "3.png", "4.png", "5.png"]);

        for (path, result) in &results {
            if path.ends_with("3.png") {
                assert!(result.is_err());
            } else {
                let record = result.as_ref().unwrap();
                assert_eq!(record.last_name, "NASSIPKHAN");
                assert!(record.is_valid());
            }
        }
    }

    #[test]
    fn test_more_paths_than_workers_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..7).map(|i| format!("{}.png", i)).collect();
        for name in &names {
            write_image(dir.path(), name);
        }
        let paths: Vec<PathBuf> = names.iter().map(|n| dir.path().join(n)).collect();

        let parser = PassportParser::new(ParserConfig::default())
            .unwrap()
            .with_backend(EchoBackend);
        let results = parse_paths(&paths, &parser, 3).unwrap();

        let returned: Vec<PathBuf> = results.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(returned, paths);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[test]
    fn test_empty_input() {
        let parser = PassportParser::new(ParserConfig::default()).unwrap();
        assert!(parse_paths(&[], &parser, 4).unwrap().is_empty());
    }
}

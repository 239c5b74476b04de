pub mod arbitration;
pub mod batch;
pub mod extractors;
pub mod image;
pub mod mrz;
pub mod ocr;
pub mod pdf;
pub mod quality;
pub mod transliteration;

pub use arbitration::{arbitrate, ArbitrationOptions, CandidateSource, FieldDecision};
pub use batch::{parse_directory, parse_paths};
pub use extractors::TextExtractor;
pub use self::image::{ImageProcessor, PreprocessMode};
pub use mrz::MrzParser;
pub use ocr::{LayoutMode, OcrBackend, OcrRequest, TesseractBackend};
pub use pdf::{LopdfTextExtractor, PdfRasterizer, PdftoppmRasterizer, TextLayerExtractor};
pub use quality::OcrQuality;

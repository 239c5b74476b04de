use crate::config::ParserConfig;
use crate::models::{DocumentRecord, FieldCandidates};
use crate::processing::arbitration::{arbitrate, ArbitrationOptions, FieldDecision};
use crate::processing::image::{ImageProcessor, PreprocessMode};
use crate::processing::mrz::MrzParser;
use crate::processing::ocr::{
    mrz_text_score, select_best_mrz_text, LayoutMode, OcrBackend, OcrRequest, TesseractBackend,
    MRZ_LAYOUTS,
};
use crate::processing::pdf::{
    LopdfTextExtractor, PdfRasterizer, PdftoppmRasterizer, TextLayerExtractor,
};
use crate::processing::quality::OcrQuality;
use crate::processing::extractors::TextExtractor;
use crate::utils::PassportError;
use image::DynamicImage;
use std::path::Path;

/// Input formats the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Image,
    /// First page only.
    Pdf,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, PassportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" => Ok(DocumentFormat::Image),
            "pdf" => Ok(DocumentFormat::Pdf),
            _ => Err(PassportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Hooks into the parsing pipeline. Nothing the parser decides depends on
/// what an observer does.
pub trait ParseObserver {
    /// Full-document OCR output, after any text-layer fallback.
    fn on_ocr_text(&self, _text: &str) {}

    /// One MRZ-pass attempt.
    fn on_mrz_text(&self, _variant: &str, _layout: LayoutMode, _text: &str) {}

    fn on_field_decision(&self, _decision: &FieldDecision) {}

    fn on_fallback(&self, _description: &str) {}
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ParseObserver for LogObserver {
    fn on_ocr_text(&self, text: &str) {
        log::debug!("Full-page OCR text ({} chars):\n{}", text.len(), text);
    }

    fn on_mrz_text(&self, variant: &str, layout: LayoutMode, text: &str) {
        log::debug!(
            "MRZ attempt {} / {:?} (score {}):\n{}",
            variant,
            layout,
            mrz_text_score(text),
            text
        );
    }

    fn on_field_decision(&self, decision: &FieldDecision) {
        log::debug!(
            "{} <- {:?} '{}' ({})",
            decision.field,
            decision.source,
            decision.value,
            decision.reason
        );
    }

    fn on_fallback(&self, description: &str) {
        log::warn!("{}", description);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {}

/// Turns a passport scan into a [`DocumentRecord`].
///
/// The OCR engine and PDF tools are collaborators behind traits; the default
/// set is tesseract, `pdftoppm` and `lopdf`. A parser holds no per-document
/// state, so one value can serve many threads.
pub struct PassportParser {
    config: ParserConfig,
    backend: Box<dyn OcrBackend + Send + Sync>,
    rasterizer: Box<dyn PdfRasterizer + Send + Sync>,
    text_layer: Box<dyn TextLayerExtractor + Send + Sync>,
    observer: Box<dyn ParseObserver + Send + Sync>,
}

impl PassportParser {
    pub fn new(config: ParserConfig) -> Result<Self, PassportError> {
        config.validate()?;
        let backend = TesseractBackend::new(config.tessdata_path.clone());
        Ok(Self {
            config,
            backend: Box::new(backend),
            rasterizer: Box::new(PdftoppmRasterizer::default()),
            text_layer: Box::new(LopdfTextExtractor),
            observer: Box::new(LogObserver),
        })
    }

    pub fn with_backend(mut self, backend: impl OcrBackend + Send + Sync + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl PdfRasterizer + Send + Sync + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    pub fn with_text_layer(
        mut self,
        text_layer: impl TextLayerExtractor + Send + Sync + 'static,
    ) -> Self {
        self.text_layer = Box::new(text_layer);
        self
    }

    pub fn with_observer(mut self, observer: impl ParseObserver + Send + Sync + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse one JPEG, PNG or PDF document.
    ///
    /// Errors only when the file cannot be read or a collaborator fails
    /// outright. A page with nothing recognisable still yields a record;
    /// check [`DocumentRecord::is_valid`].
    pub fn parse(&self, document_path: &Path) -> Result<DocumentRecord, PassportError> {
        let format = DocumentFormat::from_path(document_path)?;
        if !document_path.is_file() {
            return Err(PassportError::IoError(format!(
                "No such file: {}",
                document_path.display()
            )));
        }
        log::info!("Parsing {} as {:?}", document_path.display(), format);

        let page = match format {
            DocumentFormat::Image => ImageProcessor::load(document_path)?,
            DocumentFormat::Pdf => self
                .rasterizer
                .render_first_page(document_path, self.config.pdf_dpi)?,
        };

        let mut text = self.recognize_page(&page)?;
        if format == DocumentFormat::Pdf {
            text = self.prefer_text_layer(document_path, text);
        }
        self.observer.on_ocr_text(&text);

        let mrz_text = self.recognize_mrz(&page);
        Ok(self.parse_text_pair(&text, mrz_text.as_deref()))
    }

    /// Run extraction and arbitration on already recognised text.
    ///
    /// `mrz_text` is the output of a dedicated MRZ pass, if any. The result
    /// depends only on the two inputs and the configuration.
    pub fn parse_text_pair(&self, primary_text: &str, mrz_text: Option<&str>) -> DocumentRecord {
        let candidates = FieldCandidates {
            text: TextExtractor::parse_text(primary_text),
            mrz: MrzParser::parse_mrz(primary_text, mrz_text),
        };

        let options = ArbitrationOptions {
            infer_sex_from_given_name: self.config.infer_sex_from_given_name,
        };
        let (record, decisions) = arbitrate(&candidates, options);
        for decision in &decisions {
            self.observer.on_field_decision(decision);
        }

        if !record.is_valid() {
            log::info!("Parsed record is incomplete: {}", record.full_name());
        }
        record
    }

    fn recognize_page(&self, page: &DynamicImage) -> Result<String, PassportError> {
        let processed =
            ImageProcessor::preprocess_or_grayscale(page, PreprocessMode::Standard, &self.config);
        let png = ImageProcessor::encode_png(&processed)?;
        let request = OcrRequest::full_page(self.config.text_language_spec());
        self.backend.recognize(&png, &request)
    }

    /// Swap in the PDF text layer when OCR quality is poor and the layer
    /// holds more text.
    fn prefer_text_layer(&self, path: &Path, ocr_text: String) -> String {
        let quality = OcrQuality::assess(&ocr_text);
        if quality.is_acceptable() {
            return ocr_text;
        }

        let layer = match self.text_layer.extract_text(path) {
            Ok(Some(layer)) => layer,
            Ok(None) => {
                log::debug!("Low OCR quality {:?} and no PDF text layer", quality);
                return ocr_text;
            }
            Err(e) => {
                log::warn!("PDF text layer extraction failed: {}", e);
                return ocr_text;
            }
        };

        let layer_len = layer.trim().chars().count();
        let ocr_len = ocr_text.trim().chars().count();
        if layer_len > ocr_len {
            self.observer.on_fallback(&format!(
                "OCR quality too low ({:?}); using PDF text layer ({} chars vs {})",
                quality, layer_len, ocr_len
            ));
            layer
        } else {
            ocr_text
        }
    }

    /// Every preprocessing variant of the MRZ strip under every MRZ layout;
    /// the most MRZ-like output wins. Failed attempts are skipped.
    fn recognize_mrz(&self, page: &DynamicImage) -> Option<String> {
        let languages = self.config.mrz_language_spec();
        let mut texts = Vec::new();

        for (variant, image) in ImageProcessor::mrz_variants(page, &self.config) {
            let png = match ImageProcessor::encode_png(&image) {
                Ok(png) => png,
                Err(e) => {
                    log::warn!("Skipping MRZ variant {}: {}", variant, e);
                    continue;
                }
            };

            for layout in MRZ_LAYOUTS {
                let request = OcrRequest::mrz(languages.clone(), layout);
                match self.backend.recognize(&png, &request) {
                    Ok(text) => {
                        self.observer.on_mrz_text(variant, layout, &text);
                        texts.push(text);
                    }
                    Err(e) => log::warn!("MRZ OCR {} / {:?} failed: {}", variant, layout, e),
                }
            }
        }

        let best = select_best_mrz_text(texts);
        if best.is_none() {
            log::warn!("No MRZ pass succeeded; falling back to full-page text");
        }
        best
    }
}

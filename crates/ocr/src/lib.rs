pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;

pub use extract::{extract_fields, Extractor};
pub use pipeline::{BackendRun, FormPipeline, OcrResult, PipelineError};
pub use preprocess::{binarize, load_image, prepare_for_ocr, PreprocessError};
pub use recognizer::{EasyOcrCli, MockRecognizer, OcrBackend, OcrError, OcrInput, TesseractCli};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::LeptessRecognizer;

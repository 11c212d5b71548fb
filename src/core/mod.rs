pub mod ocr;
pub mod stream;

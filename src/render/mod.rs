//! Output renderers.
//!
//! * [`html`]   — `Document` to standalone HTML + CSS (`TryStructuredHTML`)
//! * [`pdf`]    — `Document` to PDF with lopdf (`TryAssembled`, error documents)
//! * [`chrome`] — headless Chrome/Chromium for page capture and HTML printing

pub mod chrome;
pub mod html;
pub mod pdf;

pub use chrome::ChromeRenderer;
pub use pdf::LopdfWriter;

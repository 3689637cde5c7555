use lightbox_core::{Frame, FrameContent, RenderFailure, ViewSink};

/// Prints each render to stdout.
#[derive(Debug, Default)]
pub(crate) struct ConsoleView;

impl ViewSink for ConsoleView {
    fn show(&self, frame: &Frame) {
        let size = frame
            .size_bytes()
            .map(|size| size.to_string())
            .unwrap_or_else(|| "unknown size".to_string());
        match &frame.content {
            FrameContent::Image(handle) => {
                println!("[{}] {} ({}) {}", frame.index, frame.title, size, handle.locator());
            }
            FrameContent::Streamed { source } => {
                println!("[{}] {} (video, {}) streamed from {}", frame.index, frame.title, size, source);
            }
        }
    }

    fn show_error(&self, failure: &RenderFailure) {
        match failure.status {
            Some(status) => println!(
                "[{}] {}: {} (status {})",
                failure.index, failure.title, failure.message, status
            ),
            None => println!("[{}] {}: {}", failure.index, failure.title, failure.message),
        }
    }

    fn clear(&self) {
        println!("closed");
    }
}

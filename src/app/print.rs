use gtk4::gdk::prelude::GdkCairoContextExt;
use gtk4::gdk_pixbuf::Pixbuf;
use gtk4::prelude::*;
use gtk4::{PrintOperation, PrintOperationAction, PrintOperationResult, Window};

use crate::core::PrintJob;

const PRINT_JOB_NAME: &str = "Screenshot";

/// Shows the print dialog and draws the screenshot scaled to the printable area.
pub(super) fn run_print_job(parent: &impl IsA<Window>, job: PrintJob) -> Result<(), String> {
    let pixbuf = Pixbuf::from_file(&job.image_path).map_err(|err| err.to_string())?;

    let operation = PrintOperation::new();
    operation.set_job_name(PRINT_JOB_NAME);
    operation.set_n_pages(1);
    operation.set_embed_page_setup(true);
    operation.connect_draw_page(move |_, context, _page| {
        let placement = job.placement(context.width(), context.height());
        let cairo = context.cairo_context();
        cairo.translate(placement.x, placement.y);
        cairo.scale(placement.scale, placement.scale);
        cairo.set_source_pixbuf(&pixbuf, 0.0, 0.0);
        if let Err(err) = cairo.paint() {
            tracing::warn!(%err, "failed to draw print page");
        }
    });

    match operation.run(PrintOperationAction::PrintDialog, Some(parent)) {
        Ok(PrintOperationResult::Error) => Err("print operation reported an error".to_string()),
        Ok(result) => {
            tracing::info!(?result, "print operation finished");
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}

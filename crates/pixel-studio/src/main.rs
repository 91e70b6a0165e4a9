mod editor;

use pixel_engine::device::GpuInit;
use pixel_engine::logging::{init_logging, LoggingConfig};
use pixel_engine::window::{Runtime, RuntimeConfig};

use editor::{GridEditor, StudioConfig};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let editor = GridEditor::new(StudioConfig::default(), editor::demo_grid());
    log::info!("pixel studio: wheel pans, ctrl/cmd + wheel zooms, click paints, R resets");

    Runtime::run(RuntimeConfig::default(), GpuInit::default(), editor)
}

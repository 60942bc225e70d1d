//! `multiflash images`

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::flasher::Orchestrator;

/// Lists the `.out` images and marks the selected one.
pub fn images(orchestrator: &Orchestrator, config: &RuntimeConfig) -> Result<i32> {
    let images = orchestrator.list_images()?;

    if config.json() {
        config.print_json(&images)?;
        return Ok(0);
    }

    if images.is_empty() {
        config.warn(&format!(
            "No .out images in {}",
            orchestrator.settings().image_dir().display()
        ))?;
        return Ok(1);
    }

    let selected = orchestrator.target_image();
    let selected = selected.file_name();
    for image in &images {
        let marker = if selected.is_some_and(|name| name == image.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {image}");
    }
    Ok(0)
}

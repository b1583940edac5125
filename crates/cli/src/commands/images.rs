use std::path::PathBuf;

use serde_json::json;
use threadcast_core::config::{AppConfig, LoadOptions};
use threadcast_core::files::try_get_images;

use super::{CommandResult, EXIT_CONFIG};

const EXIT_IMAGES_DIR: u8 = 3;

/// Lists what `/generate` would upload, in upload order.
pub fn run(dir: Option<PathBuf>, json_output: bool) -> CommandResult {
    let dir = match dir {
        Some(dir) => dir,
        None => match AppConfig::load(LoadOptions::default()) {
            Ok(config) => config.images.dir,
            Err(error) => {
                return CommandResult::failure(
                    "images",
                    "config_validation",
                    format!("config validation failed: {error}; pass --dir to skip config"),
                    EXIT_CONFIG,
                );
            }
        },
    };

    let images = match try_get_images(&dir) {
        Ok(images) => images,
        Err(error) => {
            return CommandResult::failure(
                "images",
                "images_dir",
                error.to_string(),
                EXIT_IMAGES_DIR,
            );
        }
    };

    let message = format!("{} image(s) in {}", images.len(), dir.display());
    if json_output {
        let entries = images
            .iter()
            .map(|image| {
                json!({
                    "name": image.name,
                    "path": image.path.display().to_string(),
                    "title": image.title(),
                })
            })
            .collect::<Vec<_>>();
        return CommandResult::success(
            "images",
            message,
            Some(json!({ "directory": dir.display().to_string(), "images": entries })),
        );
    }

    let mut lines = vec![message];
    lines.extend(images.iter().map(|image| format!("- {} ({})", image.name, image.title())));
    CommandResult::text(0, lines.join("\n"))
}

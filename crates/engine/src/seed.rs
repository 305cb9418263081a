// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap artifact deployed when the agent's own code is missing

use crate::error::SeedError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

/// Largest rendered bootstrap accepted for deployment.
pub const MAX_SEED_BYTES: usize = 1024 * 1024;

/// Values substituted into the bootstrap's config markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedParams {
    pub kernel_url: String,
    pub brain_path: String,
    pub seed_port: u16,
    pub app_port: u16,
}

/// A rendered bootstrap. The bytes never change for the life of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    rendered: String,
}

impl Seed {
    /// Read the template at `path`, merge `prompts/*.prompt` from its directory
    /// and fill in the config markers.
    pub fn load(path: &Path, params: &SeedParams) -> Result<Self, SeedError> {
        let template = read_utf8(path)?;
        let prompts_dir = path.parent().map(|p| p.join("prompts"));
        let prompts = match prompts_dir {
            Some(dir) if dir.is_dir() => read_prompts(&dir)?,
            _ => Vec::new(),
        };
        let seed = Self::render(&template, &prompts, params);
        if seed.rendered.len() > MAX_SEED_BYTES {
            return Err(SeedError::TooLarge {
                path: path.display().to_string(),
                bytes: seed.rendered.len(),
                max: MAX_SEED_BYTES,
            });
        }
        tracing::info!(
            path = %path.display(),
            prompts = prompts.len(),
            bytes = seed.rendered.len(),
            "loaded bootstrap"
        );
        Ok(seed)
    }

    /// Substitute prompts (first occurrence of `__PROMPT_<NAME>__`) and every
    /// config marker.
    pub fn render(template: &str, prompts: &[(String, String)], params: &SeedParams) -> Self {
        let mut rendered = template.to_string();
        for (name, content) in prompts {
            let marker = format!("__PROMPT_{}__", name.to_uppercase());
            rendered = rendered.replacen(&marker, content, 1);
        }
        let rendered = rendered
            .replace("__KERNEL_URL__", &params.kernel_url)
            .replace("__BRAIN_PATH__", &params.brain_path)
            .replace("__SEED_PORT__", &params.seed_port.to_string())
            .replace("__APP_PORT__", &params.app_port.to_string());
        Self { rendered }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Base64 form used for transfer to the agent host.
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.rendered.as_bytes())
    }
}

fn read_utf8(path: &Path) -> Result<String, SeedError> {
    let bytes = std::fs::read(path).map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| SeedError::NotUtf8(path.display().to_string()))
}

/// `(name, content)` for each `NAME.prompt`, ordered by file name.
fn read_prompts(dir: &Path) -> Result<Vec<(String, String)>, SeedError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SeedError::Read {
        path: dir.display().to_string(),
        source,
    })?;
    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "prompt"))
        .collect();
    paths.sort();

    let mut prompts = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        prompts.push((name.to_string(), read_utf8(&path)?));
    }
    Ok(prompts)
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;

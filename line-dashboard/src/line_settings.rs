use std::fs;
use std::io;
use std::path::Path;

use shift_metrics::AggregationSettings;

/// Loads the persisted line settings. Returns `AggregationSettings::default()` if
/// the file doesn't exist; propagates other I/O, parse and validation errors.
pub fn load(path: &Path) -> io::Result<AggregationSettings> {
    match fs::read_to_string(path) {
        Ok(content) => {
            toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AggregationSettings::default()),
        Err(e) => Err(e),
    }
}

/// Persists line settings, creating the parent directory if needed.
pub fn save(path: &Path, settings: &AggregationSettings) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(settings)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, content)
}

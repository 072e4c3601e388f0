//! Output folder and file naming.

use super::AssetStore;
use crate::error::Result;
use chrono::{Local, NaiveDateTime};

/// Format of the timestamp folder suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Pick the output folder for `safe_name` under `base_path`, using the
/// current local time for timestamped folders.
pub fn generate_output_path(
    store: &dyn AssetStore,
    base_path: &str,
    safe_name: &str,
    use_timestamp: bool,
    prevent_overwrite: bool,
) -> String {
    generate_output_path_at(
        store,
        base_path,
        safe_name,
        use_timestamp,
        prevent_overwrite,
        Local::now().naive_local(),
    )
}

/// Pick the output folder as of `now`.
///
/// With `use_timestamp` the folder is `<name>_<yyyyMMdd_HHmmss>`. Otherwise it
/// is `<name>`, and when `prevent_overwrite` is set and that folder exists the
/// first free `<name>_N` (N from 1) is used. Nothing is created.
pub fn generate_output_path_at(
    store: &dyn AssetStore,
    base_path: &str,
    safe_name: &str,
    use_timestamp: bool,
    prevent_overwrite: bool,
    now: NaiveDateTime,
) -> String {
    let base = base_path.trim_end_matches('/');
    let folder = if use_timestamp {
        format!("{}_{}", safe_name, now.format(TIMESTAMP_FORMAT))
    } else {
        safe_name.to_string()
    };
    let candidate = format!("{}/{}", base, folder);

    if !prevent_overwrite || !store.folder_exists(&candidate) {
        return candidate;
    }

    (1u32..)
        .map(|n| format!("{}_{}", candidate, n))
        .find(|path| !store.folder_exists(path))
        .unwrap_or(candidate)
}

/// Create every missing folder along `path`.
pub fn ensure_folder(store: &dyn AssetStore, path: &str) -> Result<()> {
    let mut current = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(component);

        if !store.folder_exists(&current) {
            store.create_folder(&current)?;
        }
    }
    Ok(())
}

/// Paths of the three artifacts written for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub folder: String,
    pub safe_name: String,
}

impl OutputLayout {
    pub fn new(folder: impl Into<String>, safe_name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            safe_name: safe_name.into(),
        }
    }

    pub fn atlas_path(&self) -> String {
        format!("{}/{}_Atlas.png", self.folder, self.safe_name)
    }

    pub fn material_path(&self) -> String {
        format!("{}/{}_Material.mat", self.folder, self.safe_name)
    }

    pub fn mesh_path(&self) -> String {
        format!("{}/{}_Mesh.asset", self.folder, self.safe_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FsAssetStore;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("Test Mesh With Spaces!"),
            "Test_Mesh_With_Spaces_"
        );
        assert_eq!(sanitize_file_name("ok-name_01"), "ok-name_01");
        assert_eq!(sanitize_file_name("a/b.c"), "a_b_c");
        assert_eq!(sanitize_file_name("Caf\u{e9}"), "Caf_");
    }

    #[test]
    fn test_collision_suffixes() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        ensure_folder(&store, "Assets/Combined/Crate").unwrap();

        let first = generate_output_path_at(&store, "Assets/Combined", "Crate", false, true, fixed_time());
        assert_eq!(first, "Assets/Combined/Crate_1");

        store.create_folder(&first).unwrap();
        let second = generate_output_path_at(&store, "Assets/Combined", "Crate", false, true, fixed_time());
        assert_eq!(second, "Assets/Combined/Crate_2");
    }

    #[test]
    fn test_overwrite_allowed_reuses_folder() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());
        ensure_folder(&store, "Assets/Combined/Crate").unwrap();

        let path = generate_output_path_at(&store, "Assets/Combined/", "Crate", false, false, fixed_time());
        assert_eq!(path, "Assets/Combined/Crate");
    }

    #[test]
    fn test_timestamp_folder() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());

        let path = generate_output_path_at(&store, "Assets/Combined", "Crate", true, true, fixed_time());
        assert_eq!(path, "Assets/Combined/Crate_20240309_140507");
    }

    #[test]
    fn test_ensure_folder_creates_each_level() {
        let dir = TempDir::new().unwrap();
        let store = FsAssetStore::new(dir.path());

        ensure_folder(&store, "Assets/Combined/Deep").unwrap();
        assert!(store.folder_exists("Assets"));
        assert!(store.folder_exists("Assets/Combined"));
        assert!(store.folder_exists("Assets/Combined/Deep"));

        // Existing folders are fine
        ensure_folder(&store, "Assets/Combined").unwrap();
    }

    #[test]
    fn test_output_layout_names() {
        let safe = sanitize_file_name("Test Mesh With Spaces!");
        let layout = OutputLayout::new(format!("Assets/Combined/{}", safe), safe);

        assert_eq!(
            layout.atlas_path(),
            "Assets/Combined/Test_Mesh_With_Spaces_/Test_Mesh_With_Spaces__Atlas.png"
        );
        assert!(layout.material_path().ends_with("Test_Mesh_With_Spaces__Material.mat"));
        assert!(layout.mesh_path().ends_with("Test_Mesh_With_Spaces__Mesh.asset"));
    }
}

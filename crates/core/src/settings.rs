//! Names and templates of the job service resources this bridge provisions.

use serde::{Deserialize, Serialize};

/// Display name of the produced package, and of the destination item.
pub const COLLABORATION_NAME: &str = "House.collaboration";

/// Drawing uploaded as the job input.
pub const INPUT_DRAWING: &str = "House.dwg";

/// Work item argument names, as declared by the activity parameters.
pub const INPUT_ARGUMENT: &str = "inputFile";
pub const OUTPUT_ARGUMENT: &str = "collaboration";

/// Job service resource settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaSettings {
    /// Owner nickname prefixing every alias.
    pub owner: String,
    pub activity: String,
    pub label: String,
    pub bundle_name: String,
    pub engine: String,
    /// File name of the app bundle package under the app data directory.
    pub package_name: String,
    /// Script fed to the console engine.
    pub script: String,
}

impl Default for DaSettings {
    fn default() -> Self {
        Self {
            owner: "adnworks".into(),
            activity: "createcollaboration".into(),
            label: "prod".into(),
            bundle_name: "lmvextractor".into(),
            engine: "Autodesk.AutoCAD+25_0".into(),
            package_name: "LMVExtractor.bundle.zip".into(),
            script: "EXTRACTDATA\n".into(),
        }
    }
}

impl DaSettings {
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Fully qualified activity id, `owner.activity+label`.
    pub fn activity_alias(&self) -> String {
        format!("{}.{}+{}", self.owner, self.activity, self.label)
    }

    /// Fully qualified app bundle id, `owner.bundle+label`.
    pub fn bundle_alias(&self) -> String {
        format!("{}.{}+{}", self.owner, self.bundle_name, self.label)
    }

    pub fn command_line(&self) -> String {
        format!(
            "\"$(engine.path)\\accoreconsole.exe\" /i \"$(args[{INPUT_ARGUMENT}].path)\" /al \"$(appbundles[{}].path)\" /s \"$(settings[script].path)\"",
            self.bundle_name
        )
    }
}

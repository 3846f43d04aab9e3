use crate::config::ConfigError;

/// Allow-list of class ids with display names.
///
/// Objects whose class is not listed are dropped from frame records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    entries: Vec<(i32, String)>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::vehicles()
    }
}

impl ClassTable {
    pub fn new<'a>(entries: impl IntoIterator<Item = (i32, &'a str)>) -> Result<Self, ConfigError> {
        let mut table = Self {
            entries: Vec::new(),
        };
        for (id, name) in entries {
            if name.is_empty() {
                return Err(ConfigError::InvalidClassTable(format!(
                    "class {id} has an empty name"
                )));
            }
            if table.contains(id) {
                return Err(ConfigError::InvalidClassTable(format!(
                    "class {id} listed twice"
                )));
            }
            table.entries.push((id, name.to_string()));
        }
        Ok(table)
    }

    /// COCO vehicle classes: car, motorcycle, bus, truck.
    pub fn vehicles() -> Self {
        Self {
            entries: vec![
                (2, "car".to_string()),
                (3, "motorcycle".to_string()),
                (5, "bus".to_string()),
                (7, "truck".to_string()),
            ],
        }
    }

    pub fn name(&self, class_id: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| *id == class_id)
            .map(|(_, name)| name.as_str())
    }

    pub fn contains(&self, class_id: i32) -> bool {
        self.name(class_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/yuhonas/free-exercise-db/main/dist/exercises.json";
pub const IMAGE_BASE_URL: &str =
    "https://raw.githubusercontent.com/yuhonas/free-exercise-db/main/exercises/";

/// One entry of the public exercise dataset. Only `name` is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Exercise {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub level: Option<String>,
    pub force: Option<String>,
    pub mechanic: Option<String>,
    pub equipment: Option<String>,
    pub primary_muscles: Vec<String>,
    pub secondary_muscles: Vec<String>,
    pub instructions: Vec<String>,
    pub images: Vec<String>,
}

impl Exercise {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Dataset id, falling back to the name for records without one.
    pub fn identifier(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.name,
        }
    }

    pub fn first_instruction(&self) -> Option<&str> {
        self.instructions.first().map(String::as_str)
    }

    pub fn image_urls(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|path| format!("{IMAGE_BASE_URL}{path}"))
            .collect()
    }

    pub fn mentions_muscle(&self, muscle: &str) -> bool {
        self.primary_muscles
            .iter()
            .chain(self.secondary_muscles.iter())
            .any(|m| m.eq_ignore_ascii_case(muscle))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(String),
    #[error("catalog request returned status {0}")]
    Status(u16),
    #[error("failed to read catalog body: {0}")]
    Read(std::io::Error),
    #[error("failed to parse catalog JSON: {0}")]
    Parse(serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub muscle: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    exercises: Vec<Exercise>,
}

impl Catalog {
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self { exercises }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let exercises: Vec<Exercise> = serde_json::from_str(raw).map_err(CatalogError::Parse)?;
        Ok(Self::new(exercises))
    }

    pub fn fetch(url: &str) -> Result<Self, CatalogError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(30))
            .build();
        let response = agent
            .get(url)
            .set("User-Agent", "repvoice/0.1")
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => CatalogError::Status(code),
                other => CatalogError::Http(other.to_string()),
            })?;
        let raw = response.into_string().map_err(CatalogError::Read)?;
        let catalog = Self::from_json(&raw)?;
        info!(url, count = catalog.len(), "exercise catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Option<&Exercise> {
        self.exercises
            .iter()
            .find(|exercise| exercise.identifier() == identifier)
            .or_else(|| {
                self.exercises
                    .iter()
                    .find(|exercise| exercise.name.eq_ignore_ascii_case(identifier))
            })
    }

    pub fn filter(&self, filter: &CatalogFilter) -> Vec<&Exercise> {
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        let category = filter.category.as_deref().map(str::trim).unwrap_or_default();
        let muscle = filter.muscle.as_deref().map(str::trim).unwrap_or_default();

        let mut rows: Vec<&Exercise> = self
            .exercises
            .iter()
            .filter(|exercise| exercise.name.to_lowercase().contains(&search))
            .filter(|exercise| {
                category.is_empty()
                    || exercise
                        .category
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .filter(|exercise| muscle.is_empty() || exercise.mentions_muscle(muscle))
            .collect();

        rows.sort_by_key(|exercise| exercise.name.to_lowercase());
        if filter.sort == SortOrder::Desc {
            rows.reverse();
        }
        debug!(matched = rows.len(), total = self.len(), "catalog filtered");
        rows
    }

    pub fn categories(&self) -> Vec<String> {
        let mut values: Vec<String> = self
            .exercises
            .iter()
            .filter_map(|exercise| exercise.category.clone())
            .collect();
        values.sort();
        values.dedup();
        values
    }

    pub fn muscles(&self) -> Vec<String> {
        let mut values: Vec<String> = self
            .exercises
            .iter()
            .flat_map(|exercise| exercise.primary_muscles.iter().cloned())
            .collect();
        values.sort();
        values.dedup();
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "id": "Barbell_Squat",
            "name": "Barbell Squat",
            "category": "strength",
            "level": "intermediate",
            "primaryMuscles": ["quadriceps"],
            "secondaryMuscles": ["glutes", "hamstrings"],
            "instructions": ["Set the bar on your back.", "Squat down."],
            "images": ["Barbell_Squat/0.jpg", "Barbell_Squat/1.jpg"]
        },
        {
            "name": "Air Bike",
            "category": "cardio",
            "primaryMuscles": ["abdominals"]
        },
        {
            "id": "Arm_Circles",
            "name": "Arm Circles",
            "category": "stretching",
            "primaryMuscles": ["shoulders"],
            "secondaryMuscles": ["traps"]
        }
    ]"#;

    #[test]
    fn identifier_falls_back_to_name() {
        let catalog = Catalog::from_json(SAMPLE).expect("sample should parse");
        let air_bike = &catalog.exercises()[1];
        assert_eq!(air_bike.identifier(), "Air Bike");
        assert!(air_bike.instructions.is_empty());
        assert_eq!(catalog.exercises()[0].identifier(), "Barbell_Squat");
    }

    #[test]
    fn filter_combines_search_category_and_muscle() {
        let catalog = Catalog::from_json(SAMPLE).expect("sample should parse");

        let by_search = catalog.filter(&CatalogFilter {
            search: Some("AIR".to_string()),
            ..CatalogFilter::default()
        });
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].name, "Air Bike");

        let by_secondary_muscle = catalog.filter(&CatalogFilter {
            muscle: Some("glutes".to_string()),
            ..CatalogFilter::default()
        });
        assert_eq!(by_secondary_muscle.len(), 1);

        let by_category = catalog.filter(&CatalogFilter {
            category: Some("Strength".to_string()),
            ..CatalogFilter::default()
        });
        assert_eq!(by_category[0].identifier(), "Barbell_Squat");
    }

    #[test]
    fn filter_sorts_by_name_in_both_directions() {
        let catalog = Catalog::from_json(SAMPLE).expect("sample should parse");
        let asc: Vec<&str> = catalog
            .filter(&CatalogFilter::default())
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(asc, vec!["Air Bike", "Arm Circles", "Barbell Squat"]);

        let desc = catalog.filter(&CatalogFilter {
            sort: SortOrder::Desc,
            ..CatalogFilter::default()
        });
        assert_eq!(desc[0].name, "Barbell Squat");
    }

    #[test]
    fn image_urls_are_joined_to_dataset_base() {
        let catalog = Catalog::from_json(SAMPLE).expect("sample should parse");
        let urls = catalog.exercises()[0].image_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("exercises/Barbell_Squat/0.jpg"));
    }

    #[test]
    fn lookup_accepts_id_or_case_insensitive_name() {
        let catalog = Catalog::from_json(SAMPLE).expect("sample should parse");
        assert!(catalog.find_by_identifier("Arm_Circles").is_some());
        assert!(catalog.find_by_identifier("air bike").is_some());
        assert!(catalog.find_by_identifier("Deadlift").is_none());
        assert_eq!(catalog.categories(), vec!["cardio", "strength", "stretching"]);
    }
}

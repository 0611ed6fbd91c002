//! Fixed model catalog per task type.

use crate::models::TaskType;

const CLASSIFICATION_MODELS: &[&str] = &["Logistic Regression", "Random Forest", "SVM", "KNN"];
const REGRESSION_MODELS: &[&str] = &["Linear Regression", "Random Forest Regressor", "Gradient Boosting"];
const CLUSTERING_MODELS: &[&str] = &["KMeans", "DBSCAN", "Agglomerative Clustering"];

impl TaskType {
    /// Models the remote service can train for this task, default first.
    pub fn models(self) -> &'static [&'static str] {
        match self {
            TaskType::Classification => CLASSIFICATION_MODELS,
            TaskType::Regression => REGRESSION_MODELS,
            TaskType::Clustering => CLUSTERING_MODELS,
        }
    }

    pub fn default_model(self) -> &'static str {
        self.models()[0]
    }

    pub fn offers_model(self, name: &str) -> bool {
        self.models().contains(&name)
    }
}

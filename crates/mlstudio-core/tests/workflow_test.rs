//! End-to-end workflow tests for mlstudio-core against a scripted service.

mod common;

use std::sync::Arc;

use common::FakeService;
use mlstudio_core::configurator::TARGET_REQUIRED;
use mlstudio_core::error::{HISTORY_FAILED, TRAIN_FAILED, UPLOAD_FAILED};
use mlstudio_core::intake::NOT_A_CSV;
use mlstudio_core::models::{EntryId, HistoryEntry, MetricValue};
use mlstudio_core::presenter::ResultsPage;
use mlstudio_core::service::SchemaDetails;
use mlstudio_core::{
    Activation, Configurator, DatasetHandle, HistoryView, HistoryViewer, Intake, MemoryStore,
    ResultsView, Route, ServiceError, Session, SessionKey, SessionStore, TaskType, UploadFile,
    UploadResponse, WorkflowError, WorkflowState,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;

fn uploaded(filename: &str, columns: Option<Vec<&str>>) -> UploadResponse {
    UploadResponse {
        filename: filename.to_string(),
        details: Some(SchemaDetails {
            columns: columns.map(|c| c.into_iter().map(String::from).collect()),
        }),
    }
}

fn training_envelope() -> serde_json::Value {
    json!({
        "id": 3,
        "dataset_name": "data.csv",
        "task_type": "Classification",
        "model_name": "Random Forest",
        "parameters": {"test_size": 0.2, "use_scaling": true},
        "created_at": "2025-03-01T10:00:00",
        "metrics": {
            "metrics": {"accuracy": 0.93, "precision": 0.9, "support": 150},
            "explanation": "Random Forest separated the classes well.",
            "visualizations": {},
            "model_id": "f00d"
        }
    })
}

fn session_with_dataset() -> Session<MemoryStore> {
    let session = Session::new(MemoryStore::new());
    session
        .save_dataset(&DatasetHandle::new(
            "data.csv",
            vec!["a".into(), "b".into(), "target".into()],
        ))
        .unwrap();
    session
}

fn ready<T>(activation: Activation<T>) -> T {
    match activation {
        Activation::Ready(page) => page,
        Activation::Redirect(route) => panic!("unexpected redirect to {route:?}"),
    }
}

#[tokio::test]
async fn test_upload_then_configure_without_redirect() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new().with_upload(Ok(uploaded("data.csv", Some(vec!["a", "b", "target"]))));

    let intake = Intake::new(&session, &service);
    let dataset = intake.submit(&UploadFile::new("data.csv", "a,b,target\n1,2,0\n")).await.unwrap();
    assert_eq!(dataset.columns, ["a", "b", "target"]);
    assert_eq!(session.dataset().unwrap(), Some(dataset.clone()));

    let configurator = ready(Configurator::activate(&session, &service).unwrap());
    assert_eq!(configurator.form().dataset(), &dataset);
    assert_eq!(WorkflowState::derive(&session).unwrap(), WorkflowState::Configuring);
}

#[tokio::test]
async fn test_non_csv_is_rejected_before_any_call() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new();

    let err = Intake::new(&session, &service)
        .submit(&UploadFile::new("data.xlsx", vec![0u8; 4]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), NOT_A_CSV);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_upload_failure_leaves_session_alone() {
    let session = session_with_dataset();
    let before = session.dataset().unwrap();
    let service = FakeService::new().with_upload(Err(ServiceError::http(500, None)));

    let err = Intake::new(&session, &service)
        .submit(&UploadFile::new("other.csv", "x\n1\n"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Upload(ref msg) if msg == UPLOAD_FAILED));
    assert_eq!(session.dataset().unwrap(), before);
}

#[tokio::test]
async fn test_upload_prefers_service_detail() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new().with_upload(Err(ServiceError::http(
        500,
        Some("Error processing file: empty data".into()),
    )));

    let err = Intake::new(&session, &service)
        .submit(&UploadFile::new("empty.csv", ""))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Error processing file: empty data");
}

#[tokio::test]
async fn test_missing_columns_become_empty() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new().with_upload(Ok(uploaded("raw.csv", None)));

    let dataset = Intake::new(&session, &service)
        .submit(&UploadFile::new("raw.csv", "1,2\n"))
        .await
        .unwrap();
    assert!(dataset.columns.is_empty());
}

#[tokio::test]
async fn test_reupload_overwrites_dataset() {
    let session = session_with_dataset();
    let service = FakeService::new().with_upload(Ok(uploaded("data.csv", Some(vec!["x"]))));

    let intake = Intake::new(&session, &service);
    let file = UploadFile::new("data.csv", "x\n1\n");
    intake.submit(&file).await.unwrap();
    intake.submit(&file).await.unwrap();

    assert_eq!(service.calls(), ["upload data.csv", "upload data.csv"]);
    assert_eq!(session.dataset().unwrap().unwrap().columns, ["x"]);
}

#[tokio::test]
async fn test_configure_redirects_and_purges_when_dataset_is_corrupt() {
    let session = Session::new(MemoryStore::new());
    session.store().set(SessionKey::DatasetName, "\"data.csv\"".into()).unwrap();
    session.store().set(SessionKey::DatasetDetails, "{\"columns\": [".into()).unwrap();
    let service = FakeService::new();

    let activation = Configurator::activate(&session, &service).unwrap();
    assert!(matches!(activation, Activation::Redirect(Route::Intake)));
    assert_eq!(session.store().get(SessionKey::DatasetName).unwrap(), None);
    assert_eq!(session.store().get(SessionKey::DatasetDetails).unwrap(), None);
}

#[tokio::test]
async fn test_missing_target_never_reaches_the_service() {
    let session = session_with_dataset();
    let service = FakeService::new().with_train(Ok(training_envelope()));

    let configurator = ready(Configurator::activate(&session, &service).unwrap());
    let err = configurator.submit().await.unwrap_err();

    assert_eq!(err.to_string(), TARGET_REQUIRED);
    assert!(service.calls().is_empty());
    assert_eq!(session.training_result().unwrap(), None);
}

#[tokio::test]
async fn test_training_persists_unwrapped_result() {
    let session = session_with_dataset();
    let service = FakeService::new().with_train(Ok(training_envelope()));

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_model("Random Forest").unwrap();
    configurator.form_mut().set_target_column("target");
    let result = configurator.submit().await.unwrap();

    let sent = service.last_config.lock().unwrap().clone().unwrap();
    assert_eq!(sent.target_column.as_deref(), Some("target"));
    assert_eq!(sent.task_type, TaskType::Classification);

    let stored = session.training_result().unwrap().unwrap();
    assert_eq!(stored, result);
    assert_eq!(stored.metrics.get("accuracy"), Some(&MetricValue::Float(0.93)));

    let ResultsView::Ready(page) = ResultsView::load(&session, &service).unwrap() else {
        panic!("results should be ready");
    };
    let accuracy = page.metrics.iter().find(|m| m.label == "ACCURACY").unwrap();
    assert_eq!(accuracy.value, "0.9300");
    let support = page.metrics.iter().find(|m| m.label == "SUPPORT").unwrap();
    assert_eq!(support.value, "150");
    assert_eq!(page.download_url.as_deref(), Some("http://service.test/api/download/f00d"));
    assert_eq!(WorkflowState::derive(&session).unwrap(), WorkflowState::HasResult);
}

#[tokio::test]
async fn test_training_with_flat_scores_shows_them() {
    let session = session_with_dataset();
    let service = FakeService::new().with_train(Ok(json!({
        "id": 1,
        "metrics": {
            "accuracy": 0.93,
            "explanation": "Petal width separates the classes.",
            "visualizations": {}
        }
    })));

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_target_column("target");
    configurator.submit().await.unwrap();

    let stored = session.training_result().unwrap().unwrap();
    assert_eq!(stored.metrics.len(), 1);
    assert_eq!(stored.metrics.get("accuracy"), Some(&MetricValue::Float(0.93)));
    assert_eq!(stored.explanation, "Petal width separates the classes.");

    let ResultsView::Ready(page) = ResultsView::load(&session, &service).unwrap() else {
        panic!("results should be ready");
    };
    assert_eq!(page.metrics.len(), 1);
    assert_eq!(page.metrics[0].label, "ACCURACY");
    assert_eq!(page.metrics[0].value, "0.9300");
    assert_eq!(page.download_url, None);
}

#[tokio::test]
async fn test_training_failure_keeps_form_and_reports_detail() {
    let session = session_with_dataset();
    let service = FakeService::new().with_train(Err(ServiceError::http(
        400,
        Some("Target column target not found in dataset".into()),
    )));

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_task_type(TaskType::Regression);
    configurator.form_mut().set_target_column("target");

    let err = configurator.submit().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Train(ref m) if m == "Target column target not found in dataset"));
    assert_eq!(configurator.form().task_type(), TaskType::Regression);
    assert_eq!(configurator.form().target_column(), Some("target"));
    assert!(!configurator.is_pending());
}

#[tokio::test]
async fn test_training_failure_without_detail_uses_fallback() {
    let session = session_with_dataset();
    let service = FakeService::new().with_train(Err(ServiceError::transport("connection reset")));

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_task_type(TaskType::Clustering);

    let err = configurator.submit().await.unwrap_err();
    assert_eq!(err.to_string(), TRAIN_FAILED);
}

#[tokio::test]
async fn test_resubmission_is_rejected_while_training() {
    let gate = Arc::new(Notify::new());
    let session = session_with_dataset();
    let service = FakeService::new()
        .with_train(Ok(training_envelope()))
        .gated(gate.clone());

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_task_type(TaskType::Clustering);
    let configurator = configurator;

    let first = configurator.submit();
    let second = async {
        tokio::task::yield_now().await;
        assert!(configurator.is_pending());
        let res = configurator.submit().await;
        gate.notify_one();
        res
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(matches!(second, Err(WorkflowError::Busy("training"))));
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_result_arriving_after_leaving_the_page_is_discarded() {
    let gate = Arc::new(Notify::new());
    let session = session_with_dataset();
    let service = FakeService::new()
        .with_train(Ok(training_envelope()))
        .gated(gate.clone());

    let mut configurator = ready(Configurator::activate(&session, &service).unwrap());
    configurator.form_mut().set_task_type(TaskType::Clustering);
    let configurator = configurator;

    let pending = configurator.submit();
    let leave = async {
        tokio::task::yield_now().await;
        configurator.deactivate();
        gate.notify_one();
    };
    let (res, _) = tokio::join!(pending, leave);

    assert!(matches!(res, Err(WorkflowError::Cancelled("training"))));
    assert_eq!(session.training_result().unwrap(), None);
}

#[tokio::test]
async fn test_results_without_training_show_empty_state() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new();
    assert_eq!(ResultsView::load(&session, &service).unwrap(), ResultsView::Missing);

    session.store().set(SessionKey::TrainingResults, "not json".into()).unwrap();
    assert_eq!(ResultsView::load(&session, &service).unwrap(), ResultsView::Missing);
    assert_eq!(session.store().get(SessionKey::TrainingResults).unwrap(), None);
}

#[tokio::test]
async fn test_results_without_model_id_offer_no_download() {
    let session = Session::new(MemoryStore::new());
    let service = FakeService::new();
    mlstudio_core::normalizer::persist(
        &session,
        &json!({"metrics": {"metrics": {"silhouette": 0.5}, "visualizations": {}}}),
    )
    .unwrap();

    let ResultsView::Ready(page) = ResultsView::load(&session, &service).unwrap() else {
        panic!("results should be ready");
    };
    assert_eq!(page.download_url, None);
    assert!(page.plots.is_empty());
}

#[tokio::test]
async fn test_export_plots_writes_png_files() {
    let tmp = TempDir::new().unwrap();
    let service = FakeService::new();
    let result = mlstudio_core::normalizer::normalize(&json!({
        "metrics": {
            "metrics": {"r2": 0.8},
            "visualizations": {
                "residual_plot": "data:image/png;base64,iVBORw0KGgo=",
                "feature_importance": "%%% not base64 %%%"
            }
        }
    }))
    .unwrap();

    let page = ResultsPage::new(&result, &service);
    assert_eq!(page.plots.len(), 2);
    let written = page.export_plots(tmp.path()).unwrap();

    assert_eq!(written, [tmp.path().join("residual_plot.png")]);
    let bytes = std::fs::read(&written[0]).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
}

#[tokio::test]
async fn test_history_lists_rows_or_empty_state() {
    let service = FakeService::new().with_history(Ok(vec![HistoryEntry {
        id: EntryId::Number(1),
        model_name: "Linear Regression".into(),
        task_type: "Regression".into(),
        dataset_name: "houses.csv".into(),
        metrics: json!({"r2": 0.912345}).as_object().cloned(),
        created_at: Some("2025-03-01T10:00:00".into()),
    }]));

    let HistoryView::Entries(rows) = HistoryViewer::new(&service).list().await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(rows[0].headline, "R²: 0.91");
    assert_eq!(rows[0].dataset_name, "houses.csv");

    let empty = FakeService::new().with_history(Ok(vec![]));
    assert_eq!(HistoryViewer::new(&empty).list().await.unwrap(), HistoryView::Empty);
}

#[tokio::test]
async fn test_history_failure_is_reported_not_raised() {
    let service = FakeService::new().with_history(Err(ServiceError::http(502, None)));
    let err = HistoryViewer::new(&service).list().await.unwrap_err();
    assert!(matches!(err, WorkflowError::HistoryFetch(ref m) if m == HISTORY_FAILED));
}

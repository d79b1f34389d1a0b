use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use irisid_cli::cli::{OutputMode, TemplatesCommands, TemplatesListArgs};
use irisid_cli::commands::{CommandHandler, TemplatesHandler};
use irisid_cli::errors::AppError;
use irisid_cli::pipeline::{list_templates, TemplatesListOutcome};
use irisid_core::templates::{CsvTemplateStore, SubjectId, TemplateStore};
use tempfile::TempDir;

fn list_command(dataset: PathBuf, id: Option<&str>) -> TemplatesCommands {
    TemplatesCommands::List(TemplatesListArgs {
        dataset: Some(dataset),
        id: id.map(str::to_string),
    })
}

#[test]
fn list_reads_csv_store_through_handler() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("templates.csv");
    let store = CsvTemplateStore::new(&dataset);
    store.append(&[1.0, 0.0], &SubjectId::from("A")).unwrap();
    store.append(&[0.0, 1.0], &SubjectId::from("B")).unwrap();
    store.append(&[1.0, 1.0], &SubjectId::from("A")).unwrap();

    let rendered: Arc<Mutex<Option<TemplatesListOutcome>>> = Arc::new(Mutex::new(None));
    let handler = TemplatesHandler::with_dependencies(
        list_command(dataset, Some("A")),
        |args| {
            let path = args.dataset.clone().unwrap();
            let filter = args.id.as_deref().map(SubjectId::from);
            list_templates(&CsvTemplateStore::new(&path), path, filter)
        },
        {
            let rendered = Arc::clone(&rendered);
            move |outcome, mode| {
                assert_eq!(mode, OutputMode::Json);
                *rendered.lock().unwrap() = Some(outcome.clone());
                Ok(())
            }
        },
    );

    let exit = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);
    let outcome = rendered.lock().unwrap().clone().unwrap();
    assert_eq!(outcome.total, 2);
    assert_eq!(outcome.dimension, Some(2));
    assert_eq!(outcome.subjects.len(), 1);
    assert_eq!(outcome.subjects[0].templates, 2);
}

#[test]
fn list_surfaces_corrupt_store() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("templates.csv");
    std::fs::write(&dataset, "f1,f2,label\n1.0,oops,A\n").unwrap();

    let handler = TemplatesHandler::with_dependencies(
        list_command(dataset, None),
        |args| {
            let path = args.dataset.clone().unwrap();
            list_templates(&CsvTemplateStore::new(&path), path, None)
        },
        |_outcome, _mode| Ok(()),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert!(matches!(err, AppError::StoreUnreadable { .. }));
}

//! Tests for the stage runner: ordering, data lifecycle, failures, and cleanup.

#[cfg(test)]
mod tests {
    use crate::core::{RunState, StageName};
    use crate::errors::EtlflowError;
    use crate::events::CollectingEventSink;
    use crate::pipeline::{LoadDestination, Loader, MemoryLoader, PipelineInstance};
    use crate::testing::{assert_data_window, assert_stage_sequence, stage_events};
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::Arc;

    mock! {
        pub Warehouse {}
        impl Loader<Vec<i64>> for Warehouse {
            fn insert(&self, data: &Vec<i64>, table: &str) -> anyhow::Result<()>;
        }
    }

    fn destination() -> LoadDestination {
        LoadDestination::new("sql.example.net", "warehouse", "orders")
    }

    fn doubling_pipeline(
        loader: &MemoryLoader<Vec<i64>>,
        sink: &Arc<CollectingEventSink>,
    ) -> PipelineInstance<Vec<i64>> {
        let loader = loader.clone();
        PipelineInstance::builder(
            "orders",
            || Ok(Some(vec![PathBuf::from("/nonexistent/orders.csv")])),
            |_targets| Ok(vec![1, 2, 3]),
            destination(),
        )
        .transformer(|rows| {
            rows.iter_mut().for_each(|x| *x *= 2);
            Ok(())
        })
        .loader(move |_| Ok(loader.clone()))
        .event_sink(sink.clone())
        .build()
    }

    #[test]
    fn test_default_run_executes_stages_in_order() {
        let loader = MemoryLoader::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = doubling_pipeline(&loader, &sink);

        pipeline.run(&[PathBuf::from("/nonexistent/orders.csv")]).unwrap();

        assert_stage_sequence(&sink, &StageName::WORKFLOW);
        assert_eq!(sink.events_of_type("run.completed").len(), 1);
    }

    #[test]
    fn test_data_present_only_between_extract_and_clean() {
        let loader = MemoryLoader::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = doubling_pipeline(&loader, &sink);
        assert!(pipeline.data().is_none());

        pipeline.run(&[]).unwrap();

        assert_eq!(
            stage_events(&sink, "stage.started"),
            vec![
                ("extract".to_string(), false),
                ("transform".to_string(), true),
                ("load".to_string(), true),
                ("check".to_string(), true),
                ("clean".to_string(), true),
            ]
        );
        assert_data_window(&sink);
        assert!(pipeline.data().is_none());
        assert_eq!(pipeline.state(), RunState::Cleaned);
    }

    #[test]
    fn test_loader_receives_transformed_data_and_table() {
        let loader = MemoryLoader::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = doubling_pipeline(&loader, &sink);

        pipeline.run(&[]).unwrap();

        assert_eq!(loader.batches(), vec![("orders".to_string(), vec![2, 4, 6])]);
    }

    #[test]
    fn test_default_transformer_is_identity() {
        let loader = MemoryLoader::new();
        let handle = loader.clone();
        let mut pipeline = PipelineInstance::builder(
            "identity",
            || Ok(None),
            |_targets| Ok(vec![7_i64, 8]),
            destination(),
        )
        .loader(move |_| Ok(handle.clone()))
        .build();

        pipeline.run(&[]).unwrap();

        assert_eq!(loader.batches()[0].1, vec![7, 8]);
    }

    #[test]
    fn test_stages_step_by_step() {
        let loader = MemoryLoader::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = doubling_pipeline(&loader, &sink);

        pipeline.extract(&[]).unwrap();
        assert_eq!(pipeline.data(), Some(&vec![1, 2, 3]));
        pipeline.transform().unwrap();
        assert_eq!(pipeline.data(), Some(&vec![2, 4, 6]));
        pipeline.load().unwrap();
        pipeline.check().unwrap();
        assert_eq!(pipeline.state(), RunState::Checked);
        pipeline.clean(&[]).unwrap();
        assert!(pipeline.data().is_none());
    }

    #[test]
    fn test_out_of_order_stage_is_rejected() {
        let loader = MemoryLoader::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = doubling_pipeline(&loader, &sink);

        let err = pipeline.load().unwrap_err();

        assert!(matches!(
            err,
            EtlflowError::InvalidTransition {
                stage: StageName::Load,
                state: RunState::Idle
            }
        ));
        assert!(loader.is_empty());
    }

    #[test]
    fn test_custom_run_bypasses_stages() {
        let extracted = Rc::new(Cell::new(0));
        let custom_calls = Rc::new(Cell::new(0));
        let loader = MemoryLoader::new();
        let handle = loader.clone();
        let sink = Arc::new(CollectingEventSink::new());
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("input.csv");
        fs::write(&target, "id\n1\n").unwrap();

        let extract_count = extracted.clone();
        let custom_count = custom_calls.clone();
        let mut pipeline = PipelineInstance::builder(
            "custom",
            || Ok(None),
            move |_targets| {
                extract_count.set(extract_count.get() + 1);
                Ok(vec![1_i64])
            },
            destination(),
        )
        .loader(move |_| Ok(handle.clone()))
        .run_with(move |targets| {
            assert_eq!(targets.len(), 1);
            custom_count.set(custom_count.get() + 1);
            Ok(())
        })
        .event_sink(sink.clone())
        .build();

        pipeline.run(&[target.clone()]).unwrap();

        assert_eq!(custom_calls.get(), 1);
        assert_eq!(extracted.get(), 0);
        assert!(loader.is_empty());
        assert!(target.exists());
        assert!(sink.events_of_type("stage.").is_empty());
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[test]
    fn test_custom_run_failure_is_reported() {
        let mut pipeline = PipelineInstance::builder(
            "custom",
            || Ok(None),
            |_targets| Ok(0_u8),
            destination(),
        )
        .run_with(|_targets| Err(anyhow::anyhow!("upstream API down")))
        .build();

        let err = pipeline.run(&[]).unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::CustomRun));
    }

    #[test]
    fn test_load_failure_aborts_before_check_and_clean() {
        let checked = Rc::new(Cell::new(false));
        let check_flag = checked.clone();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("input.csv");
        fs::write(&target, "id\n1\n").unwrap();
        let sink = Arc::new(CollectingEventSink::new());

        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![1_i64, 2]),
            destination(),
        )
        .loader(|_| {
            let mut warehouse = MockWarehouse::new();
            warehouse
                .expect_insert()
                .times(1)
                .returning(|_, _| Err(anyhow::anyhow!("login timeout")));
            Ok(warehouse)
        })
        .check(move || {
            check_flag.set(true);
            Ok(())
        })
        .event_sink(sink.clone())
        .build();

        let err = pipeline.run(&[target.clone()]).unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Load));
        assert!(err.to_string().contains("login timeout"));
        assert!(!checked.get());
        assert!(target.exists());
        assert_eq!(pipeline.state(), RunState::Transformed);
        assert!(pipeline.data().is_some());
        assert_eq!(sink.events_of_type("run.failed").len(), 1);
    }

    #[test]
    fn test_extract_failure_stops_everything() {
        let loader = MemoryLoader::<Vec<i64>>::new();
        let handle = loader.clone();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| -> anyhow::Result<Vec<i64>> { Err(anyhow::anyhow!("file is locked")) },
            destination(),
        )
        .loader(move |_| Ok(handle.clone()))
        .build();

        let err = pipeline.run(&[]).unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Extract));
        assert_eq!(pipeline.state(), RunState::Idle);
        assert!(loader.is_empty());
    }

    #[test]
    fn test_transform_failure_keeps_data_and_state_in_step() {
        let fail_once = Rc::new(Cell::new(true));
        let flag = fail_once.clone();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![1_i64]),
            destination(),
        )
        .transformer(move |rows| {
            if flag.replace(false) {
                return Err(anyhow::anyhow!("bad column"));
            }
            rows.push(2);
            Ok(())
        })
        .build();

        pipeline.extract(&[]).unwrap();
        let err = pipeline.transform().unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Transform));
        assert_eq!(pipeline.state(), RunState::Extracted);
        assert_eq!(pipeline.state().holds_data(), pipeline.data().is_some());
        assert_eq!(pipeline.data(), Some(&vec![1]));

        pipeline.transform().unwrap();
        assert_eq!(pipeline.data(), Some(&vec![1, 2]));
    }

    #[test]
    fn test_run_after_aborted_run_starts_fresh() {
        let fail_once = Rc::new(Cell::new(true));
        let flag = fail_once.clone();
        let loader = MemoryLoader::new();
        let handle = loader.clone();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![5_i64]),
            destination(),
        )
        .check(move || {
            if flag.replace(false) {
                Err(anyhow::anyhow!("row count mismatch"))
            } else {
                Ok(())
            }
        })
        .loader(move |_| Ok(handle.clone()))
        .build();

        assert!(pipeline.run(&[]).is_err());
        assert_eq!(pipeline.state(), RunState::Loaded);

        pipeline.run(&[]).unwrap();

        assert_eq!(pipeline.state(), RunState::Cleaned);
        assert_eq!(loader.len(), 2);
    }

    #[test]
    fn test_mock_loader_gets_destination_table() {
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![2_i64, 4]),
            destination(),
        )
        .loader(|dest: &LoadDestination| {
            assert_eq!(dest.server, "sql.example.net");
            let mut warehouse = MockWarehouse::new();
            warehouse
                .expect_insert()
                .withf(|data, table| data.as_slice() == [2, 4] && table.to_string() == "orders")
                .times(1)
                .returning(|_, _| Ok(()));
            Ok(warehouse)
        })
        .build();

        pipeline.run(&[]).unwrap();
    }

    #[test]
    fn test_loader_factory_error_is_load_failure() {
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![1_i64]),
            destination(),
        )
        .loader(|_| -> anyhow::Result<MemoryLoader<Vec<i64>>> {
            Err(anyhow::anyhow!("no route to host"))
        })
        .build();

        let err = pipeline.run(&[]).unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Load));
    }

    #[test]
    fn test_clean_deletes_existing_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        let missing = dir.path().join("never-created.csv");
        let untouched = dir.path().join("keep.csv");
        for path in [&first, &second, &untouched] {
            fs::write(path, "x").unwrap();
        }
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(()),
            destination(),
        )
        .build();

        pipeline
            .clean(&[first.clone(), missing.clone(), second.clone()])
            .unwrap();

        assert!(!first.exists());
        assert!(!second.exists());
        assert!(!missing.exists());
        assert!(untouched.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_skips_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("latest.csv");
        std::os::unix::fs::symlink(dir.path().join("gone.csv"), &link).unwrap();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(()),
            destination(),
        )
        .build();

        pipeline.clean(&[link.clone()]).unwrap();

        assert!(fs::symlink_metadata(&link).is_ok());
    }

    #[test]
    fn test_clean_failure_on_existing_target_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let subdir = dir.path().join("exports");
        fs::create_dir(&subdir).unwrap();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(()),
            destination(),
        )
        .build();

        let err = pipeline.clean(&[subdir.clone()]).unwrap_err();

        assert!(matches!(err, EtlflowError::Cleanup { path, .. } if path == subdir));
        assert!(subdir.exists());
    }

    #[test]
    fn test_default_run_removes_trigger_targets() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("drop.csv");
        fs::write(&target, "id\n1\n").unwrap();
        let loader = MemoryLoader::new();
        let handle = loader.clone();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |targets| Ok(targets.len()),
            destination(),
        )
        .loader(move |_| Ok(handle.clone()))
        .build();

        pipeline.run(&[target.clone()]).unwrap();

        assert!(!target.exists());
        assert_eq!(loader.batches(), vec![("orders".to_string(), 1_usize)]);
    }

    #[test]
    fn test_run_without_loader_fails_and_keeps_targets() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("input.csv");
        fs::write(&target, "id\n1\n").unwrap();
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Ok(None),
            |_targets| Ok(vec![1_i64]),
            destination(),
        )
        .build();

        let err = pipeline.run(&[target.clone()]).unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Load));
        assert!(err.to_string().contains("no loader configured"));
        assert!(target.exists());
        assert_eq!(pipeline.state(), RunState::Transformed);
    }

    #[test]
    fn test_trigger_normalizes_empty_targets() {
        let mut empty = PipelineInstance::builder(
            "orders",
            || Ok(Some(Vec::new())),
            |_targets| Ok(()),
            destination(),
        )
        .build();
        assert_eq!(empty.trigger().unwrap(), None);

        let mut fired = PipelineInstance::builder(
            "orders",
            || Ok(Some(vec![PathBuf::from("in.csv")])),
            |_targets| Ok(()),
            destination(),
        )
        .build();
        assert_eq!(fired.trigger().unwrap(), Some(vec![PathBuf::from("in.csv")]));
    }

    #[test]
    fn test_trigger_error_is_stage_failure() {
        let mut pipeline = PipelineInstance::builder(
            "orders",
            || Err(anyhow::anyhow!("share not mounted")),
            |_targets| Ok(()),
            destination(),
        )
        .build();

        let err = pipeline.trigger().unwrap_err();

        assert_eq!(err.failed_stage(), Some(StageName::Trigger));
    }
}

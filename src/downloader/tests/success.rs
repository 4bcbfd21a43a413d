use super::*;
use crate::config::FileCollisionAction;
use crate::hash::compute_md5;
use crate::types::Dimensions;
use tempfile::tempdir;

#[tokio::test]
async fn known_md5_names_the_file() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let image = create_image(true, &["tag1", "tag2", "tag3"]);

    let downloader = ImageDownloader::single(
        context(&transport, Config::default()),
        image.clone(),
        "%md5%.%ext%",
        dir.path(),
        Size::Full,
    );
    let report = downloader.save().await.unwrap();

    let expected = dir.path().join(format!("{MD5}.jpg"));
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].path, expected);
    assert_eq!(report.outcomes[0].size, Size::Full);
    assert_eq!(report.outcomes[0].status, SaveStatus::Saved);
    assert_eq!(report.outcomes[0].url.as_deref(), Some(FULL_URL));
    assert_eq!(std::fs::read(&expected).unwrap(), jpeg_bytes());
    assert!(Arc::ptr_eq(&report.image, &image));
}

#[tokio::test]
async fn dimensions_are_set_after_save() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let image = create_image(true, &[]);
    assert_eq!(image.dimensions(), None);

    ImageDownloader::single(
        context(&transport, Config::default()),
        image.clone(),
        "out.jpg",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(
        image.dimensions(),
        Some(Dimensions {
            width: 1,
            height: 1
        })
    );
}

#[tokio::test]
async fn unknown_md5_is_derived_from_bytes() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(bytes.clone())));
    let image = create_image(false, &[]);

    let report = ImageDownloader::single(
        context(&transport, Config::default()),
        image.clone(),
        "%md5%.%ext%",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    let derived = compute_md5(&bytes);
    assert_ne!(derived, MD5);
    assert_eq!(image.md5(), Some(derived.as_str()));
    assert_eq!(
        report.outcomes[0].path,
        dir.path().join(format!("{derived}.jpg"))
    );
}

#[tokio::test]
async fn outputs_sharing_a_size_share_one_fetch() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let outputs = vec![
        OutputRequest::new("%md5%.%ext%", dir.path().join("a"), Size::Full),
        OutputRequest::new("%id%.%ext%", dir.path().join("b"), Size::Full),
    ];

    let report = ImageDownloader::new(
        context(&transport, Config::default()),
        create_image(true, &[]),
        outputs,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(transport.requests(), vec![FULL_URL]);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].path, dir.path().join("a").join(format!("{MD5}.jpg")));
    assert_eq!(report.outcomes[1].path, dir.path().join("b").join("7331.jpg"));
    assert!(report.outcomes.iter().all(|o| o.status == SaveStatus::Saved));
    assert!(report.outcomes.iter().all(|o| o.path.exists()));
}

#[tokio::test]
async fn outcomes_follow_request_order_across_sizes() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(FULL_URL, Reply::Body(jpeg_bytes()))
            .reply(PREVIEW_URL, Reply::Body(jpeg_bytes())),
    );
    let outputs = vec![
        OutputRequest::new("preview.jpg", dir.path(), Size::Preview),
        OutputRequest::new("full.jpg", dir.path(), Size::Full),
    ];

    let report = ImageDownloader::new(
        context(&transport, Config::default()),
        create_image(true, &[]),
        outputs,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(report.outcomes[0].size, Size::Preview);
    assert_eq!(report.outcomes[1].size, Size::Full);
    assert_eq!(transport.requests(), vec![PREVIEW_URL, FULL_URL]);
}

#[tokio::test]
async fn completion_event_is_emitted_exactly_once() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let ctx = context(&transport, Config::default());
    let mut rx = ctx.subscribe();

    let report = ImageDownloader::single(ctx, create_image(true, &[]), "out.jpg", dir.path(), Size::Full)
        .save()
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(Event::Started { outputs: 1, .. })));
    assert_eq!(saved_events(&events), 1);
    match events.last() {
        Some(Event::Saved { outcomes, .. }) => assert_eq!(outcomes, &report.outcomes),
        other => panic!("expected Saved last, got {other:?}"),
    }
}

#[tokio::test]
async fn no_outputs_yields_empty_report() {
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = context(&transport, Config::default());
    let mut rx = ctx.subscribe();

    let report = ImageDownloader::new(ctx, create_image(true, &[]), Vec::new())
        .save()
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(transport.requests().is_empty());
    assert_eq!(saved_events(&drain(&mut rx)), 1);
}

#[tokio::test]
async fn sniffed_extension_replaces_declared_one_when_rotation_enabled() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(png_bytes())));

    let report = ImageDownloader::single(
        context(&transport, Config::default()),
        create_image(true, &[]),
        "%md5%.%ext%",
        dir.path(),
        Size::Full,
    )
    .with_options(SaveOptions {
        rotate_extension: true,
        ..Default::default()
    })
    .save()
    .await
    .unwrap();

    assert_eq!(report.outcomes[0].path, dir.path().join(format!("{MD5}.png")));
}

#[tokio::test]
async fn declared_extension_is_kept_without_rotation() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(png_bytes())));

    let report = ImageDownloader::single(
        context(&transport, Config::default()),
        create_image(true, &[]),
        "%md5%.%ext%",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(report.outcomes[0].path, dir.path().join(format!("{MD5}.jpg")));
}

#[tokio::test]
async fn content_type_corrects_unrecognized_bytes() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new().reply(FULL_URL, Reply::Typed(b"not an image".to_vec(), "image/gif")),
    );

    let report = ImageDownloader::single(
        context(&transport, Config::default()),
        create_image(true, &[]),
        "%id%.%ext%",
        dir.path(),
        Size::Full,
    )
    .with_options(SaveOptions {
        rotate_extension: true,
        ..Default::default()
    })
    .save()
    .await
    .unwrap();

    assert_eq!(report.outcomes[0].path, dir.path().join("7331.gif"));
}

#[tokio::test]
async fn tag_categories_resolve_after_lazy_load() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let loader = Arc::new(MockTagLoader::returning(page_tags()));
    let ctx = context(&transport, Config::default()).with_tag_loader(loader.clone());

    let report = ImageDownloader::single(
        ctx,
        create_image(true, &["tag1", "tag2", "tag3"]),
        "%copyright%/%md5%.%ext%",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(loader.calls(), 1);
    assert_eq!(
        report.outcomes[0].path,
        dir.path().join("to heart 2").join(format!("{MD5}.jpg"))
    );
    assert_eq!(single_status(&report), SaveStatus::Saved);
}

#[tokio::test]
async fn tags_are_not_loaded_when_nothing_needs_them() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let loader = Arc::new(MockTagLoader::returning(page_tags()));
    let ctx = context(&transport, Config::default()).with_tag_loader(loader.clone());

    ImageDownloader::single(ctx, create_image(true, &[]), "%md5%.%ext%", dir.path(), Size::Full)
        .save()
        .await
        .unwrap();

    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn tag_loading_can_be_disabled() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let loader = Arc::new(MockTagLoader::returning(page_tags()));
    let ctx = context(&transport, Config::default()).with_tag_loader(loader.clone());

    let report = ImageDownloader::single(ctx, create_image(true, &[]), "%copyright%%id%.jpg", dir.path(), Size::Full)
        .with_options(SaveOptions {
            load_tags: false,
            ..Default::default()
        })
        .save()
        .await
        .unwrap();

    assert_eq!(loader.calls(), 0);
    assert_eq!(report.outcomes[0].path, dir.path().join("7331.jpg"));
}

#[tokio::test]
async fn skip_collision_keeps_existing_file() {
    let dir = tempdir().unwrap();
    let existing = dir.path().join("out.jpg");
    std::fs::write(&existing, b"keep me").unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let mut config = Config::default();
    config.save.file_collision = FileCollisionAction::Skip;

    let report = ImageDownloader::single(
        context(&transport, config),
        create_image(true, &[]),
        "out.jpg",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(single_status(&report), SaveStatus::AlreadyExists);
    assert_eq!(report.outcomes[0].path, existing);
    assert_eq!(std::fs::read(&existing).unwrap(), b"keep me");
}

#[tokio::test]
async fn rename_collision_picks_a_free_name() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("out.jpg"), b"first").unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(FULL_URL, Reply::Body(jpeg_bytes())));
    let mut config = Config::default();
    config.save.file_collision = FileCollisionAction::Rename;

    let report = ImageDownloader::single(
        context(&transport, config),
        create_image(true, &[]),
        "out.jpg",
        dir.path(),
        Size::Full,
    )
    .save()
    .await
    .unwrap();

    assert_eq!(single_status(&report), SaveStatus::Saved);
    assert_eq!(report.outcomes[0].path, dir.path().join("out (1).jpg"));
    assert_eq!(std::fs::read(dir.path().join("out.jpg")).unwrap(), b"first");
}

#[tokio::test]
async fn config_updates_apply_to_the_next_run() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new().reply(SAMPLE_URL, Reply::Body(jpeg_bytes())));
    let ctx = context(&transport, Config::default());

    let first = ImageDownloader::single(ctx.clone(), create_image(true, &[]), "a.jpg", dir.path(), Size::Full)
        .save()
        .await
        .unwrap();
    assert_eq!(single_status(&first), SaveStatus::Saved);

    let mut config = ctx.config().await;
    config.save.sample_fallback = false;
    ctx.update_config(config).await.unwrap();

    let second = ImageDownloader::single(ctx, create_image(true, &[]), "b.jpg", dir.path(), Size::Full)
        .save()
        .await
        .unwrap();
    assert_eq!(single_status(&second), SaveStatus::NotFound);
}

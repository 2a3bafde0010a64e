mod common;

use common::{Harness, PUBLIC_BASE, REGISTRY_URL};
use dialcode_image::features::dialcode::{
    GetImageOptions, ImageConfig, ImageConfigInput, ImageStatus, Scope, Stage,
};
use dialcode_image::{ImageError, ShutdownManager, ShutdownReason};

fn scope() -> Scope {
    Scope::new("orgA", "pub1")
}

fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap()
        .trim_end_matches(".png")
        .to_string()
}

#[tokio::test]
async fn miss_runs_every_stage_in_order() {
    let h = Harness::new();
    let out = h
        .service()
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await
        .unwrap();

    assert!(out.created);
    assert_eq!(
        h.log.calls(),
        ["lookup", "reserve", "render", "finish", "resize", "upload", "commit"]
    );

    let filename = filename_from_url(&out.url);
    assert!(filename.starts_with("K7G9X2_"));
    assert_eq!(out.url, format!("{PUBLIC_BASE}/orgA/pub1/{filename}.png"));

    let rec = h.store.record(&filename).unwrap();
    assert_eq!(rec.status, ImageStatus::Ready);
    assert_eq!(rec.url.as_deref(), Some(out.url.as_str()));

    // 清理阶段删除了本地文件
    assert!(!h.local_file(&scope(), &filename).exists());

    // 二维码内容 = registry_url + dialcode；默认叠加文字与 20px 边框
    assert_eq!(
        h.renderer.texts.lock().unwrap().as_slice(),
        [format!("{REGISTRY_URL}K7G9X2")]
    );
    assert_eq!(
        h.finisher.stamps.lock().unwrap().as_slice(),
        [("K7G9X2".to_string(), 20)]
    );
    assert_eq!(h.finisher.sizes.lock().unwrap().as_slice(), [(30, 30)]);
}

#[tokio::test]
async fn hit_skips_all_generation_collaborators() {
    let h = Harness::new();
    let svc = h.service();
    let cfg = ImageConfig::default();

    let first = svc
        .get_image("K7G9X2", &scope(), &cfg, GetImageOptions::default())
        .await
        .unwrap();
    h.log.clear();

    let second = svc
        .get_image("K7G9X2", &scope(), &cfg, GetImageOptions::default())
        .await
        .unwrap();

    assert!(!second.created);
    assert_eq!(second.url, first.url);
    assert_eq!(h.log.calls(), ["lookup"]);
    assert_eq!(h.store.all().len(), 1);
}

#[tokio::test]
async fn explicit_defaults_share_the_implicit_image() {
    let h = Harness::new();
    let svc = h.service();

    let implicit = svc
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await
        .unwrap();

    let input: ImageConfigInput = serde_json::from_value(serde_json::json!({
        "errCorrectionLevel": "H",
        "height": 30,
        "width": "30",
        "showText": "true",
        "color": "#000"
    }))
    .unwrap();
    let explicit = svc
        .get_image(
            "K7G9X2",
            &scope(),
            &ImageConfig::from_input(&input),
            GetImageOptions::default(),
        )
        .await
        .unwrap();

    assert!(!explicit.created);
    assert_eq!(explicit.url, implicit.url);
}

#[tokio::test]
async fn different_config_or_scope_generates_again() {
    let h = Harness::new();
    let svc = h.service();

    let a = svc
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await
        .unwrap();

    let mut wide = ImageConfig::default();
    wide.width = 64;
    let b = svc
        .get_image("K7G9X2", &scope(), &wide, GetImageOptions::default())
        .await
        .unwrap();

    let c = svc
        .get_image(
            "K7G9X2",
            &Scope::new("orgB", "pub1"),
            &ImageConfig::default(),
            GetImageOptions::default(),
        )
        .await
        .unwrap();

    assert!(a.created && b.created && c.created);
    assert_ne!(a.url, b.url);
    assert!(c.url.starts_with(&format!("{PUBLIC_BASE}/orgB/pub1/K7G9X2_")));
    assert_eq!(h.store.all().len(), 3);
}

#[tokio::test]
async fn upload_failure_leaves_pending_record_without_url() {
    let h = Harness::with_failing_upload();
    let res = h
        .service()
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await;

    assert!(matches!(res, Err(ImageError::Upload(_))));
    assert_eq!(
        h.log.calls(),
        ["lookup", "reserve", "render", "finish", "resize", "upload"]
    );

    let records = h.store.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ImageStatus::Pending);
    assert!(records[0].url.is_none());
    // 上传失败时仍会清理本地文件
    assert!(!h.local_file(&scope(), &records[0].filename).exists());
}

#[tokio::test]
async fn keep_local_file_when_requested() {
    let h = Harness::new();
    let out = h
        .service()
        .get_image(
            "K7G9X2",
            &scope(),
            &ImageConfig::default(),
            GetImageOptions {
                delete_local_file: false,
                ..GetImageOptions::default()
            },
        )
        .await
        .unwrap();

    let filename = filename_from_url(&out.url);
    assert!(h.local_file(&scope(), &filename).exists());
}

#[tokio::test]
async fn path_overrides_redirect_local_and_upload_locations() {
    let h = Harness::new();
    let local_dir = h.temp_root.join("custom");
    let out = h
        .service()
        .get_image(
            "K7G9X2",
            &scope(),
            &ImageConfig::default(),
            GetImageOptions {
                local_path: Some(local_dir.clone()),
                upload_path: Some("campaign/2024".into()),
                delete_local_file: false,
            },
        )
        .await
        .unwrap();

    let filename = filename_from_url(&out.url);
    assert_eq!(out.url, format!("{PUBLIC_BASE}/campaign/2024/{filename}.png"));
    assert!(local_dir.join(format!("{filename}.png")).exists());
}

#[tokio::test]
async fn hidden_text_and_disabled_border_reach_the_finisher() {
    let h = Harness::new();
    let input: ImageConfigInput = serde_json::from_value(serde_json::json!({
        "showText": "false",
        "border": false
    }))
    .unwrap();

    h.service()
        .get_image(
            "K7G9X2",
            &scope(),
            &ImageConfig::from_input(&input),
            GetImageOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        h.finisher.stamps.lock().unwrap().as_slice(),
        [(String::new(), 0)]
    );
}

#[tokio::test]
async fn lookup_errors_fall_through_to_generation() {
    let h = Harness::with_failing_lookup();
    let out = h
        .service()
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await
        .unwrap();

    assert!(out.created);
    assert_eq!(h.log.calls().first().map(String::as_str), Some("lookup"));
    assert!(h.log.calls().contains(&"commit".to_string()));
}

#[tokio::test]
async fn shutdown_cancels_before_reserving() {
    let h = Harness::new();
    let shutdown = ShutdownManager::new();
    shutdown.trigger_shutdown(ShutdownReason::Terminate);

    let res = h
        .service()
        .with_shutdown(shutdown)
        .get_image("K7G9X2", &scope(), &ImageConfig::default(), GetImageOptions::default())
        .await;

    assert!(matches!(res, Err(ImageError::Cancelled(Stage::Reserve))));
    assert_eq!(h.log.calls(), ["lookup"]);
    assert!(h.store.all().is_empty());
}

#[tokio::test]
async fn concurrent_requests_get_distinct_filenames() {
    let h = Harness::new();
    let svc = h.service().with_render_permits(2);
    let cfg = ImageConfig::default();
    let (scope_a, scope_b) = (scope(), scope());

    let (a, b) = tokio::join!(
        svc.get_image("K7G9X2", &scope_a, &cfg, GetImageOptions::default()),
        svc.get_image("K7G9X2", &scope_b, &cfg, GetImageOptions::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // 两次都可能未命中：允许重复生成，但文件名必须不同
    if a.created && b.created {
        assert_ne!(a.url, b.url);
    }
    let names: std::collections::HashSet<_> =
        h.store.all().into_iter().map(|r| r.filename).collect();
    assert_eq!(names.len(), h.store.all().len());
}

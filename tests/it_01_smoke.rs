use faas_models::EnvSnapshot;
use faas_testsupport::{spawn_harness, InvokeClient};

fn zip_with_index_js(source: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        writer
            .start_file("index.js", zip::write::FileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut writer, source.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    buf
}

#[tokio::test(flavor = "multi_thread")]
async fn healthz_and_metrics_are_reachable() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let client = InvokeClient::new(harness.base_url.clone());

    assert!(client.health().await?);
    let metrics = client.metrics().await?;
    assert!(metrics.contains("faas_invocations_total") || metrics.is_empty());

    harness.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn query_string_is_parsed_into_req_query() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = (req, res) => {
            res.json({ hello: req.query.name || "world" });
        };"#,
    );

    let descriptor = harness
        .register_function("greet", &zip, EnvSnapshot::default(), 5_000)
        .await?;

    let client = InvokeClient::new(harness.base_url.clone());
    let resp = client
        .invoke_with_query(&descriptor.name, "", "name=Ada", "GET", &[], Vec::new())
        .await?;

    assert_eq!(resp.status, 200);
    let payload = resp.json()?;
    assert_eq!(payload["hello"], "Ada");

    harness.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_function_invoke_sync() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = (req, res) => {
            res.json({ ok: true, path: req.path, method: req.method });
        };"#,
    );

    let descriptor = harness
        .register_function("echo", &zip, EnvSnapshot::default(), 5_000)
        .await?;

    let client = InvokeClient::new(harness.base_url.clone());
    let resp = client
        .invoke(&descriptor.name, "", "GET", &[], Vec::new())
        .await?;

    assert_eq!(resp.status, 200);
    let payload = resp.json()?;
    assert_eq!(payload["ok"], true);
    assert_eq!(payload["method"], "GET");

    harness.shutdown().await;
    Ok(())
}

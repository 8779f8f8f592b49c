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
async fn thrown_error_surfaces_as_user_error_envelope() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = (req, res) => {
            throw new Error("boom");
        };"#,
    );
    let descriptor = harness
        .register_function("throws", &zip, EnvSnapshot::default(), 5_000)
        .await?;

    let client = InvokeClient::new(harness.base_url.clone());
    let resp = client
        .invoke(&descriptor.name, "", "GET", &[], Vec::new())
        .await?;

    assert_eq!(resp.status, 500);
    let payload = resp.json()?;
    assert_eq!(payload["error"], "user_error");
    assert!(payload["message"].as_str().unwrap().contains("boom"));

    harness.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_exceeding_timeout_is_reported_as_timeout() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = (req, res) => {
            return new Promise(() => {});
        };"#,
    );
    let descriptor = harness
        .register_function("hangs", &zip, EnvSnapshot::default(), 200)
        .await?;

    let client = InvokeClient::new(harness.base_url.clone());
    let resp = client
        .invoke(&descriptor.name, "", "GET", &[], Vec::new())
        .await?;

    assert_eq!(resp.status, 504);
    let payload = resp.json()?;
    assert_eq!(payload["error"], "timeout");

    harness.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_function_name_is_404() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let client = InvokeClient::new(harness.base_url.clone());

    let resp = client
        .invoke("does-not-exist", "", "GET", &[], Vec::new())
        .await?;

    assert_eq!(resp.status, 404);
    let payload = resp.json()?;
    assert_eq!(payload["error"], "function_not_found");

    harness.shutdown().await;
    Ok(())
}

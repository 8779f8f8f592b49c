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

/// A function with `max_concurrency: 1` held at one in-flight slot throttles
/// the rest with 429 (§4.1), rather than queueing them.
#[tokio::test(flavor = "multi_thread")]
async fn per_function_cap_throttles_excess_invocations() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = async (req, res) => {
            await new Promise(resolve => setTimeout(resolve, 300));
            res.json({ ok: true });
        };"#,
    );
    let descriptor = harness
        .register_function("slow", &zip, EnvSnapshot::default(), 5_000)
        .await?;
    let descriptor = harness.set_max_concurrency(&descriptor, Some(1)).await?;

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let base_url = harness.base_url.clone();
        let name = descriptor.name.clone();
        tasks.push(tokio::spawn(async move {
            InvokeClient::new(base_url)
                .invoke(&name, "", "GET", &[], Vec::new())
                .await
        }));
    }

    let results = futures::future::join_all(tasks).await;
    let mut success_count = 0;
    let mut throttle_count = 0;
    for result in results {
        let resp = result??;
        match resp.status {
            200 => success_count += 1,
            429 => throttle_count += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert!(success_count >= 1, "at least one invocation should acquire the slot");
    assert!(throttle_count >= 1, "at least one invocation should be throttled, not queued");
    assert_eq!(success_count + throttle_count, 3);

    harness.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn raising_the_cap_allows_more_concurrent_successes() -> anyhow::Result<()> {
    let harness = spawn_harness().await?;
    let zip = zip_with_index_js(
        r#"module.exports = async (req, res) => {
            await new Promise(resolve => setTimeout(resolve, 100));
            res.json({ ok: true });
        };"#,
    );
    let descriptor = harness
        .register_function("slow2", &zip, EnvSnapshot::default(), 5_000)
        .await?;
    let descriptor = harness.set_max_concurrency(&descriptor, Some(4)).await?;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let base_url = harness.base_url.clone();
        let name = descriptor.name.clone();
        tasks.push(tokio::spawn(async move {
            InvokeClient::new(base_url)
                .invoke(&name, "", "GET", &[], Vec::new())
                .await
        }));
    }

    let results = futures::future::join_all(tasks).await;
    let success_count = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(resp)) if resp.status == 200))
        .count();

    assert_eq!(success_count, 4, "cap of 4 should admit all 4 concurrent calls");

    harness.shutdown().await;
    Ok(())
}

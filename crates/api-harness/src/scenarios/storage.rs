//! Storage and upload suites, run against the storage REST API.

use super::StorageTarget;
use crate::client::ClientError;
use crate::evaluator::{Expectation, Verdict};
use crate::sequencer::{Capture, RunContext};
use common::{Bucket, StorageObject};

/// Object name used for upload and public-URL probes; never expected to exist.
pub const PROBE_OBJECT: &str = "test-file.jpg";

/// Stand-in bytes for a photo upload.
const PROBE_IMAGE: &[u8] = b"fake image content for testing";

pub async fn run_storage(target: &StorageTarget, ctx: &mut RunContext) {
    ctx.section("Storage");

    ctx.check("Storage Connection", storage_connection(target)).await;
    ctx.check_requiring("Bucket Exists", Capture::BucketNames, |names| {
        bucket_exists(target, names)
    })
    .await;
    ctx.check_requiring("Bucket Accessibility", Capture::ConfirmedBucket, |bucket| {
        bucket_accessibility(target, bucket)
    })
    .await;
    ctx.check_requiring("Bucket Permissions", Capture::ConfirmedBucket, |_| {
        bucket_permissions(target)
    })
    .await;
}

pub async fn run_upload(target: &StorageTarget, ctx: &mut RunContext) {
    ctx.section("Upload");

    ctx.check("Upload To Missing Bucket", upload_to_missing_bucket(target))
        .await;
    ctx.check("Public URL For Missing Object", public_url_for_missing_object(target))
        .await;
}

async fn storage_connection(target: &StorageTarget) -> Result<Verdict, ClientError> {
    let outcome = target.client.get("/bucket").await?;
    if let Err(failure) = Expectation::status(200).is_array().verify(&outcome) {
        return Ok(failure);
    }

    let buckets: Vec<Bucket> = match outcome.parse() {
        Ok(buckets) => buckets,
        Err(e) => return Ok(Verdict::fail(format!("Unreadable bucket list: {e}"))),
    };
    let names: Vec<&str> = buckets.iter().map(|bucket| bucket.name.as_str()).collect();

    Ok(Verdict::pass(format!(
        "Connected to storage. Found {} buckets",
        buckets.len()
    ))
    .capture(
        Capture::BucketNames,
        serde_json::to_string(&names).unwrap_or_default(),
    ))
}

async fn bucket_exists(target: &StorageTarget, names: String) -> Result<Verdict, ClientError> {
    let bucket = &target.config.bucket;
    let names: Vec<String> = serde_json::from_str(&names).unwrap_or_default();

    Ok(if names.contains(bucket) {
        Verdict::pass(format!("{bucket} bucket found")).capture(Capture::ConfirmedBucket, bucket.as_str())
    } else {
        Verdict::fail(format!(
            "{bucket} bucket not found. Available buckets: [{}]",
            names.join(", ")
        ))
    })
}

async fn bucket_accessibility(target: &StorageTarget, bucket: String) -> Result<Verdict, ClientError> {
    let outcome = target
        .client
        .get_with_query(
            &format!("/object/list/{bucket}"),
            &[("limit".to_string(), "1".to_string())],
        )
        .await?;

    Ok(match outcome.status {
        200 => match outcome.parse::<Vec<StorageObject>>() {
            Ok(objects) => Verdict::pass(format!(
                "{bucket} bucket is accessible. Contains {} files",
                objects.len()
            )),
            Err(e) => Verdict::fail(format!("Unreadable object list for {bucket}: {e}"))
                .with_snapshot(outcome.snapshot()),
        },
        404 => Verdict::fail(format!("{bucket} bucket not found or not accessible")),
        _ => Verdict::fail(outcome.describe()).with_snapshot(outcome.snapshot()),
    })
}

/// Public access is inferred from the status of a missing object's public URL.
async fn bucket_permissions(target: &StorageTarget) -> Result<Verdict, ClientError> {
    let bucket = &target.config.bucket;
    let outcome = target
        .client
        .head_public(&target.config.public_object_url(PROBE_OBJECT))
        .await?;

    Ok(match outcome.status {
        404 => Verdict::pass(format!("{bucket} bucket allows public access")),
        403 => Verdict::fail(format!("{bucket} bucket does not allow public access")),
        status => Verdict::pass(format!(
            "Bucket permissions test inconclusive (HTTP {status})"
        )),
    })
}

async fn upload_to_missing_bucket(target: &StorageTarget) -> Result<Verdict, ClientError> {
    let outcome = target
        .client
        .post_bytes(
            &format!("/object/{}/{PROBE_OBJECT}", target.config.bucket),
            "image/jpeg",
            PROBE_IMAGE.to_vec(),
        )
        .await?;

    Ok(match Expectation::any_status(&[400, 404]).verify(&outcome) {
        Ok(()) => Verdict::pass(format!(
            "Upload rejected with HTTP {}, matching the frontend's missing-bucket handling",
            outcome.status
        )),
        Err(failure) => failure,
    })
}

async fn public_url_for_missing_object(target: &StorageTarget) -> Result<Verdict, ClientError> {
    let url = target.config.public_object_url(PROBE_OBJECT);
    let outcome = target.client.head_public(&url).await?;

    Ok(match Expectation::status(404).verify(&outcome) {
        Ok(()) => Verdict::pass(format!("Public URL returns 404 for missing object: {url}")),
        Err(failure) => failure,
    })
}

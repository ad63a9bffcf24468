//! S3 Client Integration Tests
//!
//! Runs [`S3Client`] against a wiremock server speaking the S3 REST API with
//! path-style addressing, the way R2 is addressed.
//!
//! ## Test Coverage
//!
//! - PutObject returns the backend ETag
//! - Full multipart flow through the uploader
//! - 401/403/404 classification
//! - Missing upload_id / ETag in responses
//! - Preflight calls (ListBuckets, HeadBucket, ListObjectsV2)

mod common;

#[cfg(test)]
mod tests {
    use super::common::{r2_config_for, random_file, KIB};
    use bytes::Bytes;
    use r2_uplink::diagnostics::run_preflight;
    use r2_uplink::s3::{
        BucketInspector, ErrorKind, ObjectStore, S3Client, S3ClientConfig, S3ClientError,
    };
    use r2_uplink::upload::{TransferRequest, UploadError, UploadStrategy, Uploader};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Helper function to create an S3 client pointing to a mock server
    fn create_test_s3_client(mock_server: &MockServer) -> S3Client {
        let config = S3ClientConfig::from_r2(&r2_config_for(&mock_server.uri())).unwrap();
        S3Client::new(config).unwrap()
    }

    fn s3_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error><Code>{}</Code><Message>{}</Message></Error>"#,
            code, message
        ))
    }

    async fn mount_create(mock_server: &MockServer, key_path: &str, upload_id: &str) {
        Mock::given(method("POST"))
            .and(path(key_path))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <InitiateMultipartUploadResult>
                    <Bucket>imaging</Bucket>
                    <Key>scan.bin</Key>
                    <UploadId>{}</UploadId>
                </InitiateMultipartUploadResult>"#,
                upload_id
            )))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    // ========================================================================
    // PutObject
    // ========================================================================

    #[tokio::test]
    async fn test_put_object_returns_etag() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc123\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let response = client
            .put_object("imaging", "scan.bin", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(response.etag, "\"abc123\"");
    }

    #[tokio::test]
    async fn test_put_object_forbidden() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .respond_with(s3_error(403, "AccessDenied", "Access Denied"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let err = client
            .put_object("imaging", "scan.bin", Bytes::from_static(b"hello"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_unauthorized_classified() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .respond_with(s3_error(401, "Unauthorized", "Unauthorized"))
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let err = client
            .put_object("imaging", "scan.bin", Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(matches!(err, S3ClientError::Unauthorized { .. }));
        assert!(err.kind().hint().unwrap().contains("R2_ACCESS_KEY_ID"));
    }

    // ========================================================================
    // Multipart
    // ========================================================================

    #[tokio::test]
    async fn test_create_multipart_returns_upload_id() {
        let mock_server = MockServer::start().await;
        mount_create(&mock_server, "/imaging/scan.bin", "r2-upload-id-1").await;

        let client = create_test_s3_client(&mock_server);
        let response = client
            .create_multipart_upload("imaging", "scan.bin")
            .await
            .unwrap();

        assert_eq!(response.upload_id, "r2-upload-id-1");
    }

    #[tokio::test]
    async fn test_upload_part_without_etag_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("partNumber", "1"))
            .and(query_param("uploadId", "u-1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let err = client
            .upload_part("imaging", "scan.bin", "u-1", 1, Bytes::from_static(b"part"))
            .await
            .unwrap_err();

        assert!(matches!(err, S3ClientError::ResponseError(_)));
    }

    #[tokio::test]
    async fn test_multipart_flow_through_uploader() {
        let mock_server = MockServer::start().await;
        mount_create(&mock_server, "/imaging/scan.bin", "u-42").await;

        for part in 1..=3 {
            Mock::given(method("PUT"))
                .and(path("/imaging/scan.bin"))
                .and(query_param("partNumber", part.to_string()))
                .and(query_param("uploadId", "u-42"))
                .respond_with(
                    ResponseTemplate::new(200).insert_header("ETag", format!("\"etag-{}\"", part)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("uploadId", "u-42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <CompleteMultipartUploadResult>
                    <Bucket>imaging</Bucket>
                    <Key>scan.bin</Key>
                    <ETag>"final-etag-3"</ETag>
                </CompleteMultipartUploadResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (file, _) = random_file(250 * KIB);
        let request = TransferRequest::builder(file.path(), "imaging", "scan.bin")
            .size_threshold(100 * KIB)
            .part_size(100 * KIB)
            .build()
            .unwrap();

        let result = Uploader::new(create_test_s3_client(&mock_server))
            .upload(&request)
            .await
            .unwrap();

        assert_eq!(result.strategy, UploadStrategy::Multipart);
        assert_eq!(result.parts, 3);
        assert_eq!(result.etag, "\"final-etag-3\"");
    }

    #[tokio::test]
    async fn test_part_failure_does_not_complete() {
        let mock_server = MockServer::start().await;
        mount_create(&mock_server, "/imaging/scan.bin", "u-7").await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("partNumber", "1"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("partNumber", "2"))
            .respond_with(s3_error(403, "AccessDenied", "token expired"))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Neither complete nor abort may be sent
        Mock::given(method("POST"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("uploadId", "u-7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (file, _) = random_file(250 * KIB);
        let request = TransferRequest::builder(file.path(), "imaging", "scan.bin")
            .size_threshold(100 * KIB)
            .part_size(100 * KIB)
            .build()
            .unwrap();

        let err = Uploader::new(create_test_s3_client(&mock_server))
            .upload(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::PartFailed { part_number: 2, .. }));
        assert_eq!(err.backend_kind(), Some(ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn test_abort_sends_delete() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/imaging/scan.bin"))
            .and(query_param("uploadId", "u-9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        client
            .abort_multipart_upload("imaging", "scan.bin", "u-9")
            .await
            .unwrap();
    }

    // ========================================================================
    // Preflight calls
    // ========================================================================

    #[tokio::test]
    async fn test_list_buckets() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <ListAllMyBucketsResult>
                    <Buckets>
                        <Bucket><Name>imaging</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>
                        <Bucket><Name>scratch</Name><CreationDate>2024-01-02T00:00:00.000Z</CreationDate></Bucket>
                    </Buckets>
                    <Owner><ID>owner</ID></Owner>
                </ListAllMyBucketsResult>"#,
            ))
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let buckets = client.list_buckets().await.unwrap();
        assert_eq!(buckets, vec!["imaging", "scratch"]);
    }

    #[tokio::test]
    async fn test_head_missing_bucket_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/typo-bucket"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let err = client.head_bucket("typo-bucket").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_preflight_stops_after_auth_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(s3_error(401, "Unauthorized", "bad token"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_s3_client(&mock_server);
        let report = run_preflight(&client, "imaging", 5).await;

        assert!(!report.passed());
        let failure = report.first_failure().unwrap();
        assert_eq!(failure.name, "list_buckets");
        assert_eq!(failure.kind, Some(ErrorKind::Unauthorized));
    }
}

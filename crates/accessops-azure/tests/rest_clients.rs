use std::time::Duration;

use accessops_azure::{
    ArmClient, AzureError, Credential, DevOpsClient, Directory, EndpointRequest, GraphClient,
    Project, ResourceManager, ServiceEndpoints,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);
const PRINCIPAL: &str = "6b3a0f2e-1111-4000-8000-000000000001";
const SUBSCRIPTION: &str = "3f1c2a4e-0000-4000-8000-000000000001";
const ROLE_DEFINITIONS: &str = "/providers/Microsoft.Authorization/roleDefinitions";
const READER: &str = "acdd72a7-3385-48ef-bd42-f606fba81ae7";
const CONTRIBUTOR: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";

fn http() -> reqwest::Client {
    reqwest::Client::builder().timeout(TIMEOUT).build().unwrap()
}

fn credential() -> Credential {
    Credential::Static("test-token".into())
}

#[tokio::test]
async fn management_group_lookup_maps_404_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/providers/Microsoft.Management/managementGroups/mg-platform"))
        .and(query_param("api-version", "2020-05-01"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "/providers/Microsoft.Management/managementGroups/mg-platform",
            "name": "mg-platform",
            "properties": { "displayName": "Platform" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/providers/Microsoft.Management/managementGroups/mg-missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "NotFound", "message": "not found" }
        })))
        .mount(&server)
        .await;

    let arm = ArmClient::new(http(), &server.uri(), credential());

    let mg = arm.management_group("mg-platform").await.unwrap().unwrap();
    assert_eq!(mg.properties.display_name.as_deref(), Some("Platform"));
    assert!(arm.management_group("mg-missing").await.unwrap().is_none());
}

#[tokio::test]
async fn role_assignments_follow_next_link_and_keep_exact_scope() {
    let server = MockServer::start().await;
    let scope = format!("/subscriptions/{SUBSCRIPTION}");
    let next = format!(
        "{}{scope}/providers/Microsoft.Authorization/roleAssignments?page=2",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path(format!("{scope}/providers/Microsoft.Authorization/roleAssignments")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "b",
                "name": "b",
                "properties": {
                    "roleDefinitionId": format!("{ROLE_DEFINITIONS}/{READER}"),
                    "principalId": PRINCIPAL,
                    "scope": format!("{scope}/resourceGroups/rg-child")
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{scope}/providers/Microsoft.Authorization/roleAssignments")))
        .and(query_param("$filter", format!("principalId eq '{PRINCIPAL}'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "a",
                "name": "a",
                "properties": {
                    "roleDefinitionId": format!("{ROLE_DEFINITIONS}/{CONTRIBUTOR}"),
                    "principalId": PRINCIPAL,
                    "scope": scope.to_uppercase()
                }
            }],
            "nextLink": next
        })))
        .mount(&server)
        .await;

    let arm = ArmClient::new(http(), &server.uri(), credential());
    let principal = Uuid::parse_str(PRINCIPAL).unwrap();
    let assignments = arm.role_assignments(&scope, principal).await.unwrap();

    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].name, "a");
    assert!(assignments[0].grants(CONTRIBUTOR));
}

#[tokio::test]
async fn role_assignment_conflict_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(
            r"^/subscriptions/.+/providers/Microsoft.Authorization/roleAssignments/[0-9a-f-]{36}$",
        ))
        .and(body_partial_json(json!({
            "properties": { "principalId": PRINCIPAL, "principalType": "ServicePrincipal" }
        })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "RoleAssignmentExists",
                "message": "The role assignment already exists."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let arm = ArmClient::new(http(), &server.uri(), credential());
    arm.create_role_assignment(
        &format!("/subscriptions/{SUBSCRIPTION}"),
        &format!("{ROLE_DEFINITIONS}/{CONTRIBUTOR}"),
        Uuid::parse_str(PRINCIPAL).unwrap(),
    )
    .await
    .expect("conflict means the grant exists");
}

#[tokio::test]
async fn api_failure_carries_status_and_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "no access" }
        })))
        .mount(&server)
        .await;

    let arm = ArmClient::new(http(), &server.uri(), credential());
    let err = arm
        .subscription(Uuid::parse_str(SUBSCRIPTION).unwrap())
        .await
        .unwrap_err();
    match err {
        AzureError::Api { status, code, .. } => {
            assert_eq!(status, 403);
            assert_eq!(code, "AuthorizationFailed");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn graph_resolves_api_by_display_name_and_assigns_role() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/servicePrincipals"))
        .and(query_param("$filter", "displayName eq 'Microsoft Graph'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "1c2d3e4f-0000-4000-8000-000000000001",
                "appId": "00000003-0000-0000-c000-000000000000",
                "displayName": "Microsoft Graph",
                "appRoles": [{
                    "id": "7ab1d382-f21e-4acd-a863-ba3e13f7da61",
                    "value": "Directory.Read.All",
                    "isEnabled": true
                }]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1.0/servicePrincipals/{PRINCIPAL}/appRoleAssignments")))
        .and(body_partial_json(json!({
            "principalId": PRINCIPAL,
            "resourceId": "1c2d3e4f-0000-4000-8000-000000000001",
            "appRoleId": "7ab1d382-f21e-4acd-a863-ba3e13f7da61"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "x" })))
        .expect(1)
        .mount(&server)
        .await;

    let graph = GraphClient::new(http(), &server.uri(), credential());
    let api = graph
        .find_resource_api("Microsoft Graph")
        .await
        .unwrap()
        .unwrap();
    let role = api.app_role("Directory.Read.All").unwrap();
    graph
        .assign_app_role(Uuid::parse_str(PRINCIPAL).unwrap(), api.id, role.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn graph_grant_update_accepts_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/oauth2PermissionGrants/grant-1"))
        .and(body_partial_json(json!({ "scope": "User.Read openid" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let graph = GraphClient::new(http(), &server.uri(), credential());
    graph
        .update_oauth2_grant("grant-1", &["User.Read".to_string(), "openid".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn devops_finds_endpoint_with_pat_and_encoded_project() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contoso/Platform%20Team/_apis/serviceendpoint/endpoints"))
        .and(query_param("endpointNames", "sc-platform"))
        .and(query_param("api-version", "7.1"))
        // base64(":pat")
        .and(header("Authorization", "Basic OnBhdA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{
                "id": "9a7b1c2d-0000-4000-8000-000000000001",
                "name": "sc-platform",
                "type": "azurerm",
                "authorization": {
                    "scheme": "ServicePrincipal",
                    "parameters": { "serviceprincipalid": "0d5e6f70-0000-4000-8000-000000000002" }
                },
                "isReady": true
            }]
        })))
        .mount(&server)
        .await;

    let devops = DevOpsClient::new(
        http(),
        &server.uri(),
        "contoso",
        Credential::Pat("pat".into()),
    );
    let ep = devops
        .find_endpoint("Platform Team", "sc-platform")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        ep.service_principal_app_id(),
        Some(Uuid::parse_str("0d5e6f70-0000-4000-8000-000000000002").unwrap())
    );
}

#[tokio::test]
async fn devops_creates_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contoso/_apis/serviceendpoint/endpoints"))
        .and(body_partial_json(json!({ "name": "sc-platform", "type": "azurerm" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9a7b1c2d-0000-4000-8000-000000000001",
            "name": "sc-platform",
            "type": "azurerm",
            "isReady": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let devops = DevOpsClient::new(http(), &server.uri(), "contoso", credential());
    let request = EndpointRequest {
        name: "sc-platform".into(),
        description: None,
        project: Project {
            id: Uuid::new_v4(),
            name: "Platform".into(),
        },
        tenant_id: "11111111-1111-1111-1111-111111111111".into(),
        subscription_id: Uuid::parse_str(SUBSCRIPTION).unwrap(),
        subscription_name: "platform-prod".into(),
        resource_group: None,
    };
    let created = devops.create_endpoint(&request).await.unwrap();
    assert_eq!(created.name, "sc-platform");
    assert!(created.service_principal_app_id().is_none());
}

#[tokio::test]
async fn caller_client_timeout_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/providers/Microsoft.Management/managementGroups/mg-slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "id": "x", "name": "mg-slow", "properties": {} })),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let arm = ArmClient::new(http, &server.uri(), credential());

    let err = arm.management_group("mg-slow").await.unwrap_err();
    assert!(matches!(err, AzureError::Transport { .. }), "{err:?}");
}

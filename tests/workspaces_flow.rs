mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_vec, expect_json, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Deserialize)]
struct WorkspaceSummary {
    id: Uuid,
    slug: String,
    is_personal: bool,
    role: String,
}

#[derive(Deserialize)]
struct Created {
    id: Uuid,
}

#[derive(Deserialize)]
struct BoardInfo {
    id: Uuid,
}

#[derive(Deserialize)]
struct AuditEntry {
    action: String,
    entity_type: String,
    entity_title: String,
    actor_name: String,
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let app = TestApp::new().await?;
    let response = app.get("/api/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let app = TestApp::new().await?;
    let missing = app.get("/api/workspaces", None).await?;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let garbage = app.get("/api/workspaces", Some("not-a-jwt")).await?;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn personal_workspace_appears_on_first_listing() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user_token("Ada")?;

    let first: Vec<WorkspaceSummary> =
        expect_json(app.get("/api/workspaces", Some(&token)).await?, StatusCode::OK).await?;
    assert_eq!(first.len(), 1);
    assert!(first[0].is_personal);
    assert_eq!(first[0].slug, "personal");
    assert_eq!(first[0].role, "owner");

    expect_json::<Value>(
        app.post_json("/api/workspaces", &json!({ "name": "Product Team" }), Some(&token))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let second: Vec<WorkspaceSummary> =
        expect_json(app.get("/api/workspaces", Some(&token)).await?, StatusCode::OK).await?;
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[1].slug, "product-team");

    let delete_personal = app
        .delete(&format!("/api/workspaces/{}", first[0].id), Some(&token))
        .await?;
    assert_eq!(delete_personal.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn outsiders_get_forbidden_everywhere() -> Result<()> {
    let app = TestApp::new().await?;
    let (owner_user, owner) = app.user_token("Ada")?;
    let (_, outsider) = app.user_token("Mallory")?;

    let workspace: Created = expect_json(
        app.post_json("/api/workspaces", &json!({ "name": "Secret" }), Some(&owner))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let ws = workspace.id;
    let board: BoardInfo = expect_json(
        app.post_json(
            &format!("/api/workspaces/{ws}/boards"),
            &json!({ "title": "Plans" }),
            Some(&owner),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;
    let b = board.id;
    let list: Created = expect_json(
        app.post_json(
            &format!("/api/boards/{b}/lists"),
            &json!({ "title": "Todo" }),
            Some(&owner),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;
    let l = list.id;
    let card: Created = expect_json(
        app.post_json(
            &format!("/api/boards/{b}/lists/{l}/cards"),
            &json!({ "title": "Launch" }),
            Some(&owner),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;
    let c = card.id;
    let owner_id = owner_user.user_id;

    let routes: Vec<(&str, String, Value)> = vec![
        ("GET", format!("/api/workspaces/{ws}/boards"), Value::Null),
        ("POST", format!("/api/workspaces/{ws}/boards"), json!({ "title": "Heist" })),
        // Authorization is checked before validation.
        ("POST", format!("/api/workspaces/{ws}/boards"), json!({ "title": "" })),
        ("DELETE", format!("/api/workspaces/{ws}/boards/{b}"), Value::Null),
        ("DELETE", format!("/api/workspaces/{ws}"), Value::Null),
        ("GET", format!("/api/workspaces/{ws}/members"), Value::Null),
        ("DELETE", format!("/api/workspaces/{ws}/members/{owner_id}"), Value::Null),
        ("GET", format!("/api/workspaces/{ws}/audit"), Value::Null),
        ("GET", format!("/api/workspaces/{ws}/invitations"), Value::Null),
        (
            "POST",
            format!("/api/workspaces/{ws}/invitations"),
            json!({ "email": "mallory@example.com" }),
        ),
        ("GET", format!("/api/boards/{b}"), Value::Null),
        ("GET", format!("/api/boards/{}", Uuid::new_v4()), Value::Null),
        ("PATCH", format!("/api/boards/{b}"), json!({ "title": "Mine now" })),
        ("POST", format!("/api/boards/{b}/lists"), json!({ "title": "x" })),
        ("PUT", format!("/api/boards/{b}/lists/order"), json!({ "ordered_ids": [l] })),
        ("PATCH", format!("/api/boards/{b}/lists/{l}"), json!({ "title": "x" })),
        ("DELETE", format!("/api/boards/{b}/lists/{l}"), Value::Null),
        ("POST", format!("/api/boards/{b}/lists/{l}/cards"), json!({ "title": "x" })),
        (
            "PUT",
            format!("/api/boards/{b}/lists/{l}/cards/order"),
            json!({ "ordered_ids": [c] }),
        ),
        ("PATCH", format!("/api/boards/{b}/cards/{c}"), json!({ "title": "x" })),
        ("DELETE", format!("/api/boards/{b}/cards/{c}"), Value::Null),
        (
            "POST",
            format!("/api/boards/{b}/cards/{c}/move"),
            json!({ "destination_list_id": l, "index": 0 }),
        ),
        (
            "POST",
            format!("/api/boards/{b}/agent"),
            json!({ "intents": [{ "action": "create_list", "title": "x" }] }),
        ),
    ];

    for (method, path, body) in &routes {
        let response = match *method {
            "GET" => app.get(path, Some(&outsider)).await?,
            "DELETE" => app.delete(path, Some(&outsider)).await?,
            "POST" => app.post_json(path, body, Some(&outsider)).await?,
            "PATCH" => app.patch_json(path, body, Some(&outsider)).await?,
            "PUT" => app.put_json(path, body, Some(&outsider)).await?,
            other => anyhow::bail!("unsupported method {other}"),
        };
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{method} {path} should be forbidden"
        );
    }

    let view: Value =
        expect_json(app.get(&format!("/api/boards/{b}"), Some(&owner)).await?, StatusCode::OK).await?;
    assert_eq!(view["board"]["title"], "Plans");
    assert_eq!(view["lists"][0]["title"], "Todo");
    assert_eq!(view["lists"][0]["cards"][0]["title"], "Launch");
    Ok(())
}

#[tokio::test]
async fn board_delete_is_idempotent_and_audited() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user_token("Ada")?;
    let workspace: Created = expect_json(
        app.post_json("/api/workspaces", &json!({ "name": "Ops" }), Some(&token))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let workspace_id = workspace.id;
    let board: BoardInfo = expect_json(
        app.post_json(
            &format!("/api/workspaces/{workspace_id}/boards"),
            &json!({ "title": "Incidents" }),
            Some(&token),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;

    let path = format!("/api/workspaces/{workspace_id}/boards/{}", board.id);
    assert_eq!(app.delete(&path, Some(&token)).await?.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&path, Some(&token)).await?.status(), StatusCode::NO_CONTENT);

    let audit: Vec<AuditEntry> = expect_json(
        app.get(&format!("/api/workspaces/{workspace_id}/audit?limit=10"), Some(&token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, "DELETE");
    assert_eq!(audit[1].action, "CREATE");
    assert!(audit
        .iter()
        .all(|entry| entry.entity_type == "BOARD" && entry.entity_title == "Incidents"));
    assert_eq!(audit[0].actor_name, "Ada");

    let limited: Vec<AuditEntry> = expect_json(
        app.get(&format!("/api/workspaces/{workspace_id}/audit?limit=1"), Some(&token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(limited.len(), 1);
    Ok(())
}

#[tokio::test]
async fn deleting_a_workspace_removes_its_boards() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user_token("Ada")?;
    let workspace: Created = expect_json(
        app.post_json("/api/workspaces", &json!({ "name": "Temp" }), Some(&token))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let workspace_id = workspace.id;
    let board: BoardInfo = expect_json(
        app.post_json(
            &format!("/api/workspaces/{workspace_id}/boards"),
            &json!({ "title": "Scratch" }),
            Some(&token),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;
    let list: Created = expect_json(
        app.post_json(
            &format!("/api/boards/{}/lists", board.id),
            &json!({ "title": "Todo" }),
            Some(&token),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;
    let list_id = list.id;
    expect_json::<Value>(
        app.post_json(
            &format!("/api/boards/{}/lists/{list_id}/cards", board.id),
            &json!({ "title": "Card" }),
            Some(&token),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;

    let report: Value = expect_json(
        app.delete(&format!("/api/workspaces/{workspace_id}"), Some(&token))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(report, json!({ "boards": 1, "lists": 1, "cards": 1 }));

    let gone = app.get(&format!("/api/boards/{}", board.id), Some(&token)).await?;
    assert_eq!(gone.status(), StatusCode::FORBIDDEN);
    let listed: Vec<WorkspaceSummary> =
        expect_json(app.get("/api/workspaces", Some(&token)).await?, StatusCode::OK).await?;
    assert!(listed.iter().all(|w| w.is_personal));
    Ok(())
}

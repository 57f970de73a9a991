use anyhow::Result;
use fiscus::application::AppError;

mod common;
use common::test_stack;

#[tokio::test]
async fn test_register_then_login() -> Result<()> {
    let stack = test_stack().await?;

    stack.auth.register("alice@example.com", "correct-horse").await?;
    let tokens = stack.auth.login("alice@example.com", "correct-horse").await?;
    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());
    assert_ne!(tokens.access_token, tokens.refresh_token);

    Ok(())
}

#[tokio::test]
async fn test_login_with_wrong_password_is_rejected() -> Result<()> {
    let stack = test_stack().await?;

    stack.auth.register("bob@example.com", "correct-horse").await?;
    let err = stack
        .auth
        .login("bob@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    Ok(())
}

#[tokio::test]
async fn test_login_with_unknown_email_is_rejected() -> Result<()> {
    let stack = test_stack().await?;

    let err = stack
        .auth
        .login("nobody@example.com", "whatever-pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    Ok(())
}

#[tokio::test]
async fn test_register_validates_email_and_password() -> Result<()> {
    let stack = test_stack().await?;

    let err = stack.auth.register("not-an-email", "correct-horse").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let err = stack.auth.register("carol@example.com", "short").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    // Nothing was persisted for either attempt
    assert!(
        stack
            .identities
            .get_user_by_email("carol@example.com")
            .await?
            .is_none()
    );

    Ok(())
}

#[tokio::test]
async fn test_refresh_rotates_the_token_pair() -> Result<()> {
    let stack = test_stack().await?;

    let registered = stack.auth.register("dave@example.com", "correct-horse").await?;
    let old_refresh = registered.tokens.refresh_token;

    let rotated = stack.auth.refresh(&old_refresh).await?;
    assert_ne!(rotated.refresh_token, old_refresh);

    // The consumed token cannot be replayed
    let err = stack.auth.refresh(&old_refresh).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    // The rotated one works
    stack.auth.refresh(&rotated.refresh_token).await?;

    Ok(())
}

#[tokio::test]
async fn test_refresh_rejects_unknown_tokens() -> Result<()> {
    let stack = test_stack().await?;

    let err = stack.auth.refresh("not-a-jwt").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    Ok(())
}

#[tokio::test]
async fn test_logout_revokes_the_refresh_token() -> Result<()> {
    let stack = test_stack().await?;

    let registered = stack.auth.register("erin@example.com", "correct-horse").await?;
    let refresh_token = registered.tokens.refresh_token;

    stack.auth.logout(&refresh_token).await?;

    let err = stack.auth.refresh(&refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    // Logging out twice is rejected: the token is gone
    let err = stack.auth.logout(&refresh_token).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    Ok(())
}

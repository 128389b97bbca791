pub fn render_verify_email(verify_url: &str, ttl_minutes: i64) -> String {
    let expires_in = describe_ttl(ttl_minutes);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Confirm your email</h2>
    <p>Please confirm that this address belongs to your account.</p>
    <p><a href="{verify_url}" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Verify Email</a></p>
    <p style="color: #666; font-size: 14px;">This link expires in {expires_in}. If you didn't create an account, you can ignore it.</p>
</body>
</html>"#
    )
}

pub fn render_password_reset(reset_url: &str, ttl_minutes: i64) -> String {
    let expires_in = describe_ttl(ttl_minutes);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Password Reset</h2>
    <p>A password reset was requested for your account.</p>
    <p><a href="{reset_url}" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Reset Password</a></p>
    <p style="color: #666; font-size: 14px;">This link expires in {expires_in}. If you didn't request this, you can ignore it.</p>
</body>
</html>"#
    )
}

fn describe_ttl(minutes: i64) -> String {
    match minutes {
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{m} minutes"),
    }
}

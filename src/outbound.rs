use crate::error::Error;
use crate::twilio_types::CallResource;
use crate::types::Config;

use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{error, info};

/// Rejects callback URLs Twilio could never reach.  A private or non-https
/// address here is a deployment mistake, not a transient failure, so the
/// call is never placed.
pub fn validate_public_https(url: &str) -> Result<(), Error> {
    let rest = url
        .strip_prefix("https://")
        .ok_or_else(|| Error::Configuration(format!("webhook URL must be https: {url}")))?;
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return Err(Error::Configuration(format!("webhook URL has no host: {url}")));
    }
    if host.eq_ignore_ascii_case("localhost") || host.to_lowercase().ends_with(".local") {
        return Err(Error::Configuration(format!(
            "webhook URL host is not publicly reachable: {host}"
        )));
    }
    if let Ok(addr) = host.parse::<IpAddr>() {
        let private = match addr {
            IpAddr::V4(v4) => {
                v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
        };
        if private {
            return Err(Error::Configuration(format!(
                "webhook URL host is not publicly reachable: {host}"
            )));
        }
    }
    Ok(())
}

/// Places an outbound call that will drive its dialogue through our voice
/// and status webhooks.  Returns the new call sid.
pub async fn start_call(
    config: &Config,
    http_client: &reqwest::Client,
    to: &str,
) -> Result<String, Error> {
    let base = config.public_base_url.trim_end_matches('/');
    let voice_url = format!("{base}/twilio/voice");
    let status_url = format!("{base}/twilio/status");
    validate_public_https(&voice_url)?;
    validate_public_https(&status_url)?;

    let account_sid = &config.twilio_account_sid;
    let url = format!("https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Calls.json");
    let mut form = HashMap::new();
    form.insert("To", to);
    form.insert("From", config.twilio_phone_number.as_str());
    form.insert("Url", voice_url.as_str());
    form.insert("StatusCallback", status_url.as_str());
    form.insert("StatusCallbackMethod", "POST");
    let resp = http_client
        .post(url)
        .basic_auth(account_sid, Some(&config.twilio_auth_token))
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            error!(error=%e, "failed to send call create request to twilio");
            Error::Provider("call create request failed".to_string())
        })?;
    if !resp.status().is_success() {
        let status = resp.status();
        error!(status=%status, "twilio rejected call create");
        return Err(Error::Provider(format!("call create returned {status}")));
    }
    let call = resp.json::<CallResource>().await.map_err(|e| {
        error!(error=%e, "failed to deserialize call resource");
        Error::Provider("call resource deserialization failed".to_string())
    })?;
    info!(call_sid=%call.sid, to=%to, "call initiated");
    Ok(call.sid)
}

/// Pushes new TwiML into a live call via the REST API.  Used to deliver the
/// assistant's reply when the triggering webhook has already been answered.
pub async fn respond_to_call(
    config: &Config,
    http_client: &reqwest::Client,
    call_sid: &str,
    twiml: String,
) -> Result<(), Error> {
    let account_sid = &config.twilio_account_sid;
    let url =
        format!("https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Calls/{call_sid}.json");
    let mut form = HashMap::new();
    form.insert("Twiml", twiml);
    let resp = http_client
        .post(url)
        .basic_auth(account_sid, Some(&config.twilio_auth_token))
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            error!(error=%e, "failed to send call update request to twilio");
            Error::Provider("call update request failed".to_string())
        })?;
    if !resp.status().is_success() {
        let status = resp.status();
        error!(status=%status, call_sid=%call_sid, "twilio rejected call update");
        return Err(Error::Provider(format!("call update returned {status}")));
    }
    Ok(())
}

//! Upstream `appmsgpublish` payloads and their classification.
use engine_logging::engine_warn;
use harvester_core::{normalize_timestamp, RawListItem};
use serde::Deserialize;

use crate::FetchedPage;

pub const RET_OK: i64 = 0;
pub const RET_FREQUENCY_CONTROL: i64 = 200013;
pub const RET_INVALID_SESSION: i64 = 200003;

#[derive(Debug, Deserialize)]
struct ListingResponse {
    base_resp: BaseResp,
    /// JSON document encoded as a string.
    publish_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaseResp {
    ret: i64,
    #[serde(default)]
    err_msg: String,
}

#[derive(Debug, Deserialize)]
struct PublishPage {
    #[serde(default)]
    publish_list: Vec<PublishEntry>,
}

#[derive(Debug, Deserialize)]
struct PublishEntry {
    /// Also a JSON document encoded as a string.
    publish_info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishInfo {
    #[serde(default)]
    appmsgex: Vec<AppMsg>,
}

#[derive(Debug, Deserialize)]
struct AppMsg {
    #[serde(default, deserialize_with = "string_or_number")]
    aid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    cover: String,
    update_time: Option<i64>,
    create_time: Option<i64>,
    #[serde(default)]
    digest: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Classifies one listing response body. Upstream statuses become signals, never errors.
pub fn classify_listing(body: &[u8]) -> FetchedPage {
    let response: ListingResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(err) => return FetchedPage::malformed(format!("undecodable listing: {err}")),
    };

    match response.base_resp.ret {
        RET_OK => {}
        RET_FREQUENCY_CONTROL => {
            return FetchedPage::rate_limited(format!(
                "frequency control: {}",
                response.base_resp.err_msg
            ))
        }
        RET_INVALID_SESSION => {
            return FetchedPage::session_invalid(format!(
                "invalid session: {}",
                response.base_resp.err_msg
            ))
        }
        ret => {
            return FetchedPage::malformed(format!(
                "upstream ret={ret} err_msg={}",
                response.base_resp.err_msg
            ))
        }
    }

    let Some(raw_page) = response.publish_page.filter(|page| !page.trim().is_empty()) else {
        return FetchedPage::end_of_listing();
    };
    let page: PublishPage = match serde_json::from_str(&raw_page) {
        Ok(page) => page,
        Err(err) => return FetchedPage::malformed(format!("undecodable publish_page: {err}")),
    };
    if page.publish_list.is_empty() {
        return FetchedPage::end_of_listing();
    }

    let mut items = Vec::new();
    for entry in page.publish_list {
        let Some(raw_info) = entry.publish_info else {
            continue;
        };
        let info: PublishInfo = match serde_json::from_str(&raw_info) {
            Ok(info) => info,
            Err(err) => {
                engine_warn!("PublishInfoSkipped reason={}", err);
                continue;
            }
        };
        // Upstream lists each publish oldest-first.
        for msg in info.appmsgex.into_iter().rev() {
            if let Some(item) = to_raw_item(msg) {
                items.push(item);
            }
        }
    }
    FetchedPage::ok(items)
}

fn to_raw_item(msg: AppMsg) -> Option<RawListItem> {
    let Some(timestamp) = msg.update_time.or(msg.create_time) else {
        engine_warn!("ListingEntrySkipped aid={} reason=missing_timestamp", msg.aid);
        return None;
    };
    let digest = Some(msg.digest.trim().to_string()).filter(|d| !d.is_empty());
    Some(RawListItem {
        external_id: msg.aid,
        title: msg.title,
        raw_body_ref: msg.link.clone(),
        link: msg.link,
        cover_url: msg.cover,
        published_at_unix: normalize_timestamp(timestamp),
        digest,
    })
}

//! WebDAV multistatus documents

use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use skydav_core::Properties;
use std::io;

/// Percent-encode a client path for use in an href, keeping the delimiters
pub fn encode_href(path: &str, is_collection: bool) -> String {
    let mut href: String = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if !href.starts_with('/') {
        href.insert(0, '/');
    }
    if is_collection && !href.ends_with('/') {
        href.push('/');
    }
    href
}

/// `getlastmodified` format (RFC 1123)
pub fn http_date(t: &DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

fn text_element<W: io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn start_document() -> io::Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("D:multistatus").with_attributes([("xmlns:D", "DAV:")]),
    ))?;
    Ok(writer)
}

fn finish_document(mut writer: Writer<Vec<u8>>) -> io::Result<String> {
    writer.write_event(Event::End(BytesEnd::new("D:multistatus")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_props<W: io::Write>(writer: &mut Writer<W>, props: &Properties) -> io::Result<()> {
    text_element(writer, "D:displayname", &props.display_name)?;

    if props.is_collection {
        writer.write_event(Event::Start(BytesStart::new("D:resourcetype")))?;
        writer.write_event(Event::Empty(BytesStart::new("D:collection")))?;
        writer.write_event(Event::End(BytesEnd::new("D:resourcetype")))?;
    } else {
        writer.write_event(Event::Empty(BytesStart::new("D:resourcetype")))?;
    }

    if let Some(length) = props.content_length {
        text_element(writer, "D:getcontentlength", &length.to_string())?;
    }
    if let Some(ct) = &props.content_type {
        text_element(writer, "D:getcontenttype", ct)?;
    }
    if let Some(etag) = &props.etag {
        text_element(writer, "D:getetag", &format!("\"{}\"", etag))?;
    }
    text_element(
        writer,
        "D:creationdate",
        &props.created.to_rfc3339_opts(SecondsFormat::Secs, true),
    )?;
    text_element(writer, "D:getlastmodified", &http_date(&props.modified))
}

/// PROPFIND answer: one `<response>` per `(path, properties)` pair
pub fn propfind_multistatus(entries: &[(String, Properties)]) -> io::Result<String> {
    let mut writer = start_document()?;

    for (path, props) in entries {
        writer.write_event(Event::Start(BytesStart::new("D:response")))?;
        text_element(&mut writer, "D:href", &encode_href(path, props.is_collection))?;
        writer.write_event(Event::Start(BytesStart::new("D:propstat")))?;
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        write_props(&mut writer, props)?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
        text_element(&mut writer, "D:status", &status_line(StatusCode::OK))?;
        writer.write_event(Event::End(BytesEnd::new("D:propstat")))?;
        writer.write_event(Event::End(BytesEnd::new("D:response")))?;
    }

    finish_document(writer)
}

/// Partial failure of a DELETE/COPY/MOVE: one `<response>` per failed path
pub fn failure_multistatus(failed: &[(String, StatusCode)]) -> io::Result<String> {
    let mut writer = start_document()?;

    for (path, status) in failed {
        writer.write_event(Event::Start(BytesStart::new("D:response")))?;
        text_element(&mut writer, "D:href", &encode_href(path, false))?;
        text_element(&mut writer, "D:status", &status_line(*status))?;
        writer.write_event(Event::End(BytesEnd::new("D:response")))?;
    }

    finish_document(writer)
}

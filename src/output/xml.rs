use super::{DecisionOutput, DocsOutput, FilterOutput};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::error::Error;
use std::io::Cursor;

pub fn render_filter(data: &FilterOutput) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = BytesStart::new("changes");
    writer.write_event(Event::Start(root.borrow()))?;

    write_element(&mut writer, "project", &data.project)?;
    write_element(&mut writer, "base", &data.base)?;
    write_element(&mut writer, "processed", &data.processed.to_string())?;
    write_element(&mut writer, "skipped", &data.skipped.to_string())?;

    let files = BytesStart::new("files");
    writer.write_event(Event::Start(files.borrow()))?;

    for file in &data.files {
        write_file_element(&mut writer, file)?;
    }

    writer.write_event(Event::End(BytesEnd::new("files")))?;
    writer.write_event(Event::End(BytesEnd::new("changes")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

pub fn output_filter(data: &FilterOutput) -> Result<(), Box<dyn Error>> {
    println!("{}", render_filter(data)?);
    Ok(())
}

pub fn render_docs(data: &DocsOutput) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let root = BytesStart::new("docs");
    writer.write_event(Event::Start(root.borrow()))?;

    write_element(&mut writer, "project", &data.project)?;
    write_element(&mut writer, "change_terms", &data.change_terms.to_string())?;

    for doc in &data.docs {
        let mut elem = BytesStart::new("doc");
        elem.push_attribute(("path", doc.path.as_str()));
        elem.push_attribute(("matches", doc.match_count.to_string().as_str()));
        elem.push_attribute(("reason", doc.reason.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }

    writer.write_event(Event::End(BytesEnd::new("docs")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

pub fn output_docs(data: &DocsOutput) -> Result<(), Box<dyn Error>> {
    println!("{}", render_docs(data)?);
    Ok(())
}

fn write_file_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    file: &DecisionOutput,
) -> Result<(), Box<dyn Error>> {
    let mut elem = BytesStart::new("file");
    elem.push_attribute(("path", file.path.as_str()));
    elem.push_attribute(("process", file.process.to_string().as_str()));
    elem.push_attribute(("category", file.category.to_string().as_str()));
    elem.push_attribute(("reason", file.reason.as_str()));

    if let Some(magnitude) = file.magnitude {
        elem.push_attribute(("magnitude", format!("{:.2}", magnitude).as_str()));
    }
    if let Some(relevance) = file.relevance {
        elem.push_attribute(("relevance", format!("{:.2}", relevance).as_str()));
    }
    if let Some(detail) = file.detail {
        elem.push_attribute(("detail", detail.to_string().as_str()));
    }
    if let Some(tokens) = file.tokens {
        elem.push_attribute(("tokens", tokens.to_string().as_str()));
    }

    if file.related_docs.is_empty() && file.payload.is_none() {
        writer.write_event(Event::Empty(elem))?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem.borrow()))?;

    for doc in &file.related_docs {
        let mut doc_elem = BytesStart::new("related");
        doc_elem.push_attribute(("path", doc.as_str()));
        writer.write_event(Event::Empty(doc_elem))?;
    }

    if let Some(ref payload) = file.payload {
        let payload_elem = BytesStart::new("payload");
        writer.write_event(Event::Start(payload_elem.borrow()))?;
        writer.write_event(Event::CData(BytesCData::new(payload)))?;
        writer.write_event(Event::End(BytesEnd::new("payload")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("file")))?;

    Ok(())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    content: &str,
) -> Result<(), Box<dyn Error>> {
    let elem = BytesStart::new(name);
    writer.write_event(Event::Start(elem.borrow()))?;
    writer.write_event(Event::Text(BytesText::new(content)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

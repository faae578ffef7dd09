//! Minimal XML-RPC codec over `serde_json::Value`.
//!
//! Requests are rendered as strings; responses are read into a small
//! element tree with quick-xml and then folded into JSON values.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use oerpfs_core::RemoteError;

/// Render a `<methodCall>` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b {
                "<boolean>1</boolean>"
            } else {
                "<boolean>0</boolean>"
            });
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => out.push_str(&format!("<int>{}</int>", i)),
            Some(i) => out.push_str(&format!("<i8>{}</i8>", i)),
            None => out.push_str(&format!("<double>{}</double>", n.as_f64().unwrap_or(0.0))),
        },
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// One element of a parsed response.
#[derive(Debug)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn new(name: String) -> Self {
        Node {
            name,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn expect_child(&self, name: &str) -> Result<&Node, RemoteError> {
        self.child(name).ok_or_else(|| {
            RemoteError::Protocol(format!("<{}> is missing <{}>", self.name, name))
        })
    }
}

fn parse_tree(xml: &str) -> Result<Node, RemoteError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::new(String::new())];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(Node::new(name));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::new(name));
                }
            }
            Ok(Event::End(_)) => {
                let node = stack.pop().filter(|_| !stack.is_empty()).ok_or_else(|| {
                    RemoteError::Protocol("unbalanced XML-RPC response".to_string())
                })?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| RemoteError::Protocol(format!("bad XML text: {}", e)))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RemoteError::Protocol(format!(
                    "Failed to parse XML-RPC response: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(document), true) => Ok(document),
        _ => Err(RemoteError::Protocol(
            "truncated XML-RPC response".to_string(),
        )),
    }
}

fn decode_value(node: &Node) -> Result<Value, RemoteError> {
    // An untyped <value> is a string.
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text.trim();
    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| RemoteError::Protocol(format!("bad integer '{}'", text))),
        "boolean" => match text {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(RemoteError::Protocol(format!("bad boolean '{}'", other))),
        },
        "double" => text
            .parse::<f64>()
            .map(|f| Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
            .map_err(|_| RemoteError::Protocol(format!("bad double '{}'", text))),
        "string" => Ok(Value::String(typed.text.clone())),
        "dateTime.iso8601" | "base64" => Ok(Value::String(text.to_string())),
        "nil" => Ok(Value::Null),
        "array" => {
            let data = typed.expect_child("data")?;
            data.children
                .iter()
                .filter(|c| c.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = Map::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.expect_child("name")?.text.clone();
                let value = decode_value(member.expect_child("value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Object(members))
        }
        other => Err(RemoteError::Protocol(format!(
            "unsupported XML-RPC type <{}>",
            other
        ))),
    }
}

fn fault_field(fault: &Map<String, Value>, key: &str) -> String {
    match fault.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Decode a `<methodResponse>` document into its single return value.
///
/// A `<fault>` response becomes [`RemoteError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, RemoteError> {
    let document = parse_tree(xml)?;
    let response = document.expect_child("methodResponse")?;

    if let Some(fault) = response.child("fault") {
        let value = decode_value(fault.expect_child("value")?)?;
        let members = value.as_object().cloned().unwrap_or_default();
        return Err(RemoteError::Fault {
            code: fault_field(&members, "faultCode"),
            message: fault_field(&members, "faultString"),
        });
    }

    let value = response
        .expect_child("params")?
        .expect_child("param")?
        .expect_child("value")?;
    decode_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(value: &str) -> String {
        format!(
            "<?xml version='1.0'?>\n<methodResponse>\n<params>\n<param>\n{}\n</param>\n</params>\n</methodResponse>\n",
            value
        )
    }

    #[test]
    fn test_encode_call_scalars() {
        let xml = encode_call("login", &[json!("demo"), json!(7), json!(false)]);
        assert!(xml.contains("<methodName>login</methodName>"));
        assert!(xml.contains("<value><string>demo</string></value>"));
        assert!(xml.contains("<value><int>7</int></value>"));
        assert!(xml.contains("<value><boolean>0</boolean></value>"));
    }

    #[test]
    fn test_encode_escapes_text() {
        let xml = encode_call("execute", &[json!("a<b & \"c\"")]);
        assert!(xml.contains("<string>a&lt;b &amp; &quot;c&quot;</string>"));
    }

    #[test]
    fn test_encode_domain_and_context() {
        let xml = encode_call(
            "execute",
            &[json!([["id", "=", 17]]), json!({"import": true}), json!(null)],
        );
        assert!(xml.contains(
            "<array><data><value><array><data><value><string>id</string></value><value><string>=</string></value><value><int>17</int></value></data></array></value></data></array>"
        ));
        assert!(xml.contains(
            "<struct><member><name>import</name><value><boolean>1</boolean></value></member></struct>"
        ));
        assert!(xml.contains("<nil/>"));
    }

    #[test]
    fn test_encode_large_int_uses_i8() {
        let xml = encode_call("m", &[json!(5_000_000_000i64)]);
        assert!(xml.contains("<i8>5000000000</i8>"));
    }

    #[test]
    fn test_decode_int_list() {
        let xml = wrap(
            "<value><array><data>\n<value><int>3</int></value>\n<value><int>1</int></value>\n</data></array></value>",
        );
        assert_eq!(decode_response(&xml).unwrap(), json!([3, 1]));
    }

    #[test]
    fn test_decode_records() {
        let xml = wrap(
            r#"<value><array><data><value><struct>
<member><name>id</name><value><int>9</int></value></member>
<member><name>name</name><value><string>contract.pdf</string></value></member>
<member><name>datas</name><value><boolean>0</boolean></value></member>
</struct></value></data></array></value>"#,
        );
        assert_eq!(
            decode_response(&xml).unwrap(),
            json!([{"id": 9, "name": "contract.pdf", "datas": false}])
        );
    }

    #[test]
    fn test_decode_untyped_value_is_string() {
        let xml = wrap("<value>plain text</value>");
        assert_eq!(decode_response(&xml).unwrap(), json!("plain text"));
    }

    #[test]
    fn test_decode_string_keeps_whitespace_and_entities() {
        let xml = wrap("<value><string>  a &amp; b\n</string></value>");
        assert_eq!(decode_response(&xml).unwrap(), json!("  a & b\n"));
    }

    #[test]
    fn test_decode_empty_string() {
        let xml = wrap("<value><string></string></value>");
        assert_eq!(decode_response(&xml).unwrap(), json!(""));
        let xml = wrap("<value><string/></value>");
        assert_eq!(decode_response(&xml).unwrap(), json!(""));
    }

    #[test]
    fn test_decode_misc_types() {
        assert_eq!(decode_response(&wrap("<value><nil/></value>")).unwrap(), json!(null));
        assert_eq!(decode_response(&wrap("<value><double>1.5</double></value>")).unwrap(), json!(1.5));
        assert_eq!(decode_response(&wrap("<value><i4>-1</i4></value>")).unwrap(), json!(-1));
        assert_eq!(
            decode_response(&wrap("<value><dateTime.iso8601>20240101T10:00:00</dateTime.iso8601></value>")).unwrap(),
            json!("20240101T10:00:00")
        );
        assert_eq!(
            decode_response(&wrap("<value><base64>SEVM\nTE8=</base64></value>")).unwrap(),
            json!("SEVM\nTE8=")
        );
    }

    #[test]
    fn test_decode_fault() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><string>warning -- Object Error</string></value></member>
<member><name>faultString</name><value><string>Object res.foo doesn't exist</string></value></member>
</struct></value></fault></methodResponse>"#;

        match decode_response(xml) {
            Err(RemoteError::Fault { code, message }) => {
                assert_eq!(code, "warning -- Object Error");
                assert_eq!(message, "Object res.foo doesn't exist");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_numeric_fault_code() {
        let xml = r#"<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>3</int></value></member>
<member><name>faultString</name><value><string>Access denied</string></value></member>
</struct></value></fault></methodResponse>"#;

        assert!(matches!(
            decode_response(xml),
            Err(RemoteError::Fault { code, .. }) if code == "3"
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_response("<html>502</html>"), Err(RemoteError::Protocol(_))));
        assert!(matches!(
            decode_response(&wrap("<value><blob>x</blob></value>")),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            decode_response(&wrap("<value><int>nope</int></value>")),
            Err(RemoteError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(decode_response("<methodResponse><params><param><value>").is_err());
    }
}

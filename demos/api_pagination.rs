/// Example: Exporting paginated API responses as CSV
/// A route returns `{page, users: [...]}` envelopes; the exporter unwraps
/// `users`, resolves a per-request schema for `settings`, and streams rows.
use serde_json::json;
use std::sync::Arc;
use tabulate::routes::{Method, RouteKey};
use tabulate::{
    negotiate, CsvSink, Exporter, FnResolver, RequestContext, RouteDeclaration, RouteRegistry,
    SchemaNode, TabularConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Exporting Paginated API Responses ===\n");

    let user = SchemaNode::object([
        ("id", SchemaNode::integer()),
        ("name", SchemaNode::string()),
        ("country", SchemaNode::string()),
        ("joined", SchemaNode::date()),
        // Shape depends on the tenant, resolved per request
        ("settings", SchemaNode::free_object()),
        (
            "orders",
            SchemaNode::array(SchemaNode::object([
                ("product", SchemaNode::string()),
                ("amount", SchemaNode::number()),
            ])),
        ),
    ]);
    let page = SchemaNode::object([
        ("page", SchemaNode::integer()),
        ("users", SchemaNode::array(user)),
    ]);

    let registry = RouteRegistry::builder()
        .route(
            RouteDeclaration::new(Method::Get, "/users")
                .response_schema(page)
                .dynamic_schema(
                    "settings",
                    FnResolver(|request: &RequestContext| -> anyhow::Result<SchemaNode> {
                        let mut fields = vec![("theme", SchemaNode::string())];
                        if request.query_param("tenant") == Some("acme") {
                            fields.push(("cost_center", SchemaNode::string()));
                        }
                        Ok(SchemaNode::object(fields))
                    }),
                ),
        )
        .build();

    let config = TabularConfig {
        max_array_elements: 2,
        result_key: Some("users".into()),
        ..Default::default()
    };
    let exporter = Exporter::new(Arc::new(registry), config)?;

    let pages = vec![
        json!({
            "page": 1,
            "users": [
                {
                    "id": 1,
                    "name": "Alice",
                    "country": "USA",
                    "joined": "2016-07-04T13:56:31.000Z",
                    "settings": {"theme": "dark", "cost_center": "R&D"},
                    "orders": [
                        {"product": "Laptop", "amount": 999.99},
                        {"product": "Mouse", "amount": 29.99},
                        {"product": "Dock", "amount": 149.0}
                    ]
                },
                {
                    "id": 2,
                    "name": "=cmd|' /C calc'!A0",
                    "country": "UK",
                    "settings": null,
                    "orders": [{"product": "Keyboard", "amount": 79.99}]
                }
            ]
        }),
        json!({"page": 2, "users": []}),
    ];

    for (i, body) in pages.into_iter().enumerate() {
        // The client asked for `/users.csv?tenant=acme`
        let negotiation = negotiate("/users.csv?tenant=acme", Some("application/json"), exporter.config());
        let Some(format) = negotiation.format else {
            continue;
        };

        let mut request = RequestContext::new(RouteKey::new(Method::Get, negotiation.path.clone()));
        if let Some(query) = &negotiation.query {
            request = request.with_query(query.clone());
        }

        let mut sink = CsvSink::new(Vec::new(), exporter.config().separator_byte());
        let head = exporter.export(&request, format, body, &mut sink).await?;

        println!("--- page {} ---", i + 1);
        if let Some(head) = head {
            println!("Content-Type: {}", head.content_type);
            println!("Content-Disposition: {}\n", head.content_disposition);
        }
        print!("{}", String::from_utf8(sink.into_inner()?)?);
        println!();
    }

    println!("Notes:");
    println!("  • orders beyond the second are dropped, missing ones leave empty cells");
    println!("  • the formula-like name is prefixed with a quote");
    println!("  • settings columns come from the per-request resolver");

    Ok(())
}

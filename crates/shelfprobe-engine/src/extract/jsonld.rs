//! schema.org JSON-LD product extraction.

use serde_json::Value;
use shelfprobe_core::SourceKind;

use super::{non_empty, scalar_text, ProductFields};
use crate::normalize::quantity_hint;

/// Containers deeper than this are not searched for products.
const MAX_DEPTH: usize = 8;

/// Parses one `<script type="application/ld+json">` body into product fields.
///
/// # Errors
///
/// Returns the JSON error text when the block is not valid JSON.
pub(super) fn products_from_block(text: &str) -> Result<Vec<ProductFields>, String> {
    let trimmed = text
        .trim()
        .trim_start_matches("<!--")
        .trim_end_matches("-->")
        .trim();
    let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;

    let mut nodes = Vec::new();
    collect_products(&value, 0, &mut nodes);
    Ok(nodes.into_iter().map(product_fields).collect())
}

/// Walks arrays, `@graph` containers, `ItemList`s and `mainEntity` wrappers,
/// collecting every node typed as a product, in document order.
fn collect_products<'a>(value: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_products(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_products(graph, depth + 1, out);
            }
            if has_type(value, "ProductGroup") {
                match map.get("hasVariant") {
                    Some(variants @ Value::Array(_)) => collect_products(variants, depth + 1, out),
                    _ => out.push(value),
                }
            } else if has_type(value, "Product") {
                out.push(value);
            } else if has_type(value, "ItemList") {
                if let Some(elements) = map.get("itemListElement") {
                    collect_list_elements(elements, depth + 1, out);
                }
            }
            if let Some(entity) = map.get("mainEntity") {
                collect_products(entity, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// `ListItem`s usually wrap the product in `item`; some sites inline it.
fn collect_list_elements<'a>(elements: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    let Some(items) = elements.as_array() else {
        collect_products(elements, depth, out);
        return;
    };
    for element in items {
        match element.get("item") {
            Some(inner) => collect_products(inner, depth + 1, out),
            None => collect_products(element, depth + 1, out),
        }
    }
}

/// `@type` may be a plain string, an IRI, or an array of either.
fn has_type(item: &Value, wanted: &str) -> bool {
    let matches = |s: &str| {
        let local = s.rsplit(['/', ':']).next().unwrap_or(s);
        local.eq_ignore_ascii_case(wanted)
    };
    match item.get("@type") {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn product_fields(item: &Value) -> ProductFields {
    let offer = first_object(item.get("offers"));
    let spec = offer.and_then(|o| first_object(o.get("priceSpecification")));

    let price_text = offer
        .and_then(|o| {
            if has_type(o, "AggregateOffer") {
                o.get("lowPrice").or_else(|| o.get("price"))
            } else {
                o.get("price")
            }
        })
        .or_else(|| spec.and_then(|s| s.get("price")))
        .and_then(scalar_text);

    let currency_hint = offer
        .and_then(|o| o.get("priceCurrency"))
        .or_else(|| spec.and_then(|s| s.get("priceCurrency")))
        .and_then(scalar_text);

    let name = item.get("name").and_then(scalar_text);

    let quantity_text = item
        .get("size")
        .and_then(size_text)
        .or_else(|| item.get("weight").and_then(size_text))
        .or_else(|| name.as_deref().and_then(quantity_hint))
        .or_else(|| {
            item.get("description")
                .and_then(Value::as_str)
                .and_then(quantity_hint)
        });

    let gtin = ["gtin13", "gtin14", "gtin12", "gtin8", "gtin"]
        .iter()
        .find_map(|key| item.get(*key).and_then(scalar_text));

    ProductFields {
        name,
        price_text,
        currency_hint,
        quantity_text,
        availability_text: offer
            .and_then(|o| o.get("availability"))
            .and_then(scalar_text),
        url: item
            .get("url")
            .and_then(scalar_text)
            .or_else(|| offer.and_then(|o| o.get("url")).and_then(scalar_text)),
        sku: item
            .get("sku")
            .and_then(scalar_text)
            .or_else(|| item.get("productID").and_then(scalar_text)),
        gtin,
        source: SourceKind::Jsonld,
    }
}

fn first_object(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Array(items) => items.iter().find(|v| v.is_object()),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

/// `size` may be text (`"750 ml"`) or a `QuantitativeValue` with a UN/CEFACT
/// unit code.
fn size_text(value: &Value) -> Option<String> {
    if let Some(text) = value.as_str() {
        return non_empty(text);
    }
    let amount = value.get("value").and_then(scalar_text)?;
    let unit = value
        .get("unitText")
        .and_then(scalar_text)
        .or_else(|| {
            value
                .get("unitCode")
                .and_then(Value::as_str)
                .and_then(unit_code_token)
                .map(str::to_string)
        })?;
    Some(format!("{amount} {unit}"))
}

fn unit_code_token(code: &str) -> Option<&'static str> {
    let token = match code.trim().to_ascii_uppercase().as_str() {
        "MLT" => "ml",
        "CLT" => "cl",
        "LTR" => "l",
        "GRM" => "g",
        "KGM" => "kg",
        "ONZ" => "oz",
        "LBR" => "lb",
        "H87" | "C62" => "pcs",
        _ => return None,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_product_with_offer() {
        let block = r#"{
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Olijfolie Extra Vierge",
            "size": "750 ml",
            "gtin13": "8710398500021",
            "offers": {"@type": "Offer", "price": 8.99, "priceCurrency": "EUR",
                       "availability": "https://schema.org/InStock"}
        }"#;
        let products = products_from_block(block).unwrap();
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name.as_deref(), Some("Olijfolie Extra Vierge"));
        assert_eq!(p.price_text.as_deref(), Some("8.99"));
        assert_eq!(p.currency_hint.as_deref(), Some("EUR"));
        assert_eq!(p.quantity_text.as_deref(), Some("750 ml"));
        assert_eq!(p.gtin.as_deref(), Some("8710398500021"));
    }

    #[test]
    fn graph_and_item_list_are_expanded_in_order() {
        let block = r#"{"@graph": [
            {"@type": "WebSite", "name": "Shop"},
            {"@type": "ItemList", "itemListElement": [
                {"@type": "ListItem", "position": 1, "item": {"@type": "Product", "name": "A", "offers": {"price": "1.00"}}},
                {"@type": "ListItem", "position": 2, "item": {"@type": "Product", "name": "B", "offers": {"price": "2.00"}}}
            ]}
        ]}"#;
        let names: Vec<_> = products_from_block(block)
            .unwrap()
            .into_iter()
            .map(|p| p.name.unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn aggregate_offer_uses_low_price() {
        let block = r#"[{"@type": ["Product"], "name": "Oil",
            "offers": {"@type": "AggregateOffer", "lowPrice": "4.49", "highPrice": "6.99", "priceCurrency": "EUR"}}]"#;
        let products = products_from_block(block).unwrap();
        assert_eq!(products[0].price_text.as_deref(), Some("4.49"));
    }

    #[test]
    fn price_specification_fallback() {
        let block = r#"{"@type": "Product", "name": "Oil",
            "offers": [{"@type": "Offer", "priceSpecification": {"price": "3.29", "priceCurrency": "GBP"}}]}"#;
        let p = &products_from_block(block).unwrap()[0];
        assert_eq!(p.price_text.as_deref(), Some("3.29"));
        assert_eq!(p.currency_hint.as_deref(), Some("GBP"));
    }

    #[test]
    fn weight_quantitative_value_with_unit_code() {
        let block = r#"{"@type": "http://schema.org/Product", "name": "Rice",
            "weight": {"@type": "QuantitativeValue", "value": 1, "unitCode": "KGM"}}"#;
        let p = &products_from_block(block).unwrap()[0];
        assert_eq!(p.quantity_text.as_deref(), Some("1 kg"));
    }

    #[test]
    fn quantity_hint_from_name_when_size_missing() {
        let block = r#"{"@type": "Product", "name": "Zonnebloemolie 1L", "offers": {"price": "2.19"}}"#;
        let p = &products_from_block(block).unwrap()[0];
        assert_eq!(p.quantity_text.as_deref(), Some("1L"));
    }

    #[test]
    fn product_group_yields_variants() {
        let block = r#"{"@type": "ProductGroup", "name": "Oil", "hasVariant": [
            {"@type": "Product", "name": "Oil 500 ml"}, {"@type": "Product", "name": "Oil 1 l"}]}"#;
        assert_eq!(products_from_block(block).unwrap().len(), 2);
    }

    #[test]
    fn non_product_block_yields_nothing() {
        let block = r#"{"@type": "BreadcrumbList", "itemListElement": []}"#;
        assert!(products_from_block(block).unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(products_from_block("{\"@type\": \"Product\", ").is_err());
    }
}

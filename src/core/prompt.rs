//! Prompt construction for the confectionery research assistant.
//!
//! Every user turn is suffixed with an instruction block that pins the answer
//! language, the comparison table columns and the embedded JSON payloads the
//! extractor looks for.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};

pub const SYSTEM_INSTRUCTION: &str = r#"You are SweetScout, a market research assistant for the confectionery industry (candies, cakes, desserts and snacks). Use the search tool for current prices and reviews.

When the user asks about a single product or sends a photo of one:
1. Identify 3 direct competitor products currently on the market.
2. Build a comparison table with the main product and the 3 competitors.
3. After the table, add a section on comparative advantages and disadvantages.
4. Finish with a section on quality improvements.

When the user names several products to compare, build the comparison table for them and add the comparative advantages and disadvantages section.

Whenever you compare products, end the answer with a chart block:
- "bar" for quantities such as price, calories or weight;
- "radar" for qualitative 1-10 scores such as flavor, texture, sweetness, packaging or value.
```json
{
  "type": "bar",
  "title": "Price & Rating Comparison",
  "categories": ["Price (k VND)", "Rating (1-5)", "Sweetness (1-10)"],
  "series": [
    { "label": "Product A", "data": [15, 4.5, 8] },
    { "label": "Product B", "data": [12, 4.0, 6] }
  ]
}
```

Whenever you produce a comparison table, also emit its raw data for export:
```json
{
  "type": "comparison_data",
  "headers": ["Product", "Price", "Flavor"],
  "rows": [
    ["Product A", "10000", "Sweet"],
    ["Product B", "12000", "Salty"]
  ]
}
```

Answer in Markdown, in the language requested with each message."#;

pub const REGENERATE_PROMPT: &str = "Please regenerate the previous response. If it contained a comparison table, strictly update the columns to match the current settings. If the language changed, translate the entire response.";

pub const IMAGE_ONLY_PROMPT: &str = "Analyze this product image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    Vn,
    En,
    Kr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Vn, Language::En, Language::Kr];

    pub fn code(self) -> &'static str {
        match self {
            Language::Vn => "VN",
            Language::En => "EN",
            Language::Kr => "KR",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Vn => "Vietnamese",
            Language::En => "English",
            Language::Kr => "Korean",
        }
    }

    fn product_name_header(self) -> &'static str {
        match self {
            Language::Vn => "Tên sản phẩm",
            Language::En => "Product Name",
            Language::Kr => "제품명",
        }
    }

    pub fn generic_error(self) -> &'static str {
        match self {
            Language::Vn => "Xin lỗi, tôi gặp lỗi khi xử lý yêu cầu của bạn. Vui lòng thử lại.",
            Language::En => {
                "Sorry, I encountered an error while processing your request. Please try again."
            }
            Language::Kr => "죄송합니다. 요청을 처리하는 중 오류가 발생했습니다. 다시 시도해 주세요.",
        }
    }

    pub fn missing_key_error(self) -> &'static str {
        match self {
            Language::Vn => "Chưa cấu hình API Key. Hãy đặt GEMINI_API_KEY và xem hướng dẫn bên dưới.",
            Language::En => "API key missing. Set GEMINI_API_KEY and see the setup help below.",
            Language::Kr => "API 키가 없습니다. GEMINI_API_KEY를 설정하고 아래 안내를 확인하세요.",
        }
    }

    pub fn sources_label(self) -> &'static str {
        match self {
            Language::Vn => "Nguồn tham khảo",
            Language::En => "Sources",
            Language::Kr => "출처",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VN" | "VI" => Ok(Language::Vn),
            "EN" => Ok(Language::En),
            "KR" | "KO" => Ok(Language::Kr),
            other => Err(format!("unknown language '{other}' (expected VN, EN or KR)")),
        }
    }
}

/// Column the user wants in product comparison tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonAttribute {
    ProductImage,
    Price,
    Flavor,
    Ingredients,
    Audience,
    Reviews,
    ProsCons,
    ProductProfile,
    SocialReviews,
}

impl ComparisonAttribute {
    pub const ALL: [ComparisonAttribute; 9] = [
        ComparisonAttribute::ProductImage,
        ComparisonAttribute::Price,
        ComparisonAttribute::Flavor,
        ComparisonAttribute::Ingredients,
        ComparisonAttribute::Audience,
        ComparisonAttribute::Reviews,
        ComparisonAttribute::ProsCons,
        ComparisonAttribute::ProductProfile,
        ComparisonAttribute::SocialReviews,
    ];

    pub fn defaults() -> Vec<ComparisonAttribute> {
        vec![
            ComparisonAttribute::ProductImage,
            ComparisonAttribute::Price,
            ComparisonAttribute::Flavor,
            ComparisonAttribute::Ingredients,
            ComparisonAttribute::Reviews,
            ComparisonAttribute::ProsCons,
            ComparisonAttribute::SocialReviews,
        ]
    }

    pub fn key(self) -> &'static str {
        match self {
            ComparisonAttribute::ProductImage => "product_image",
            ComparisonAttribute::Price => "price",
            ComparisonAttribute::Flavor => "flavor",
            ComparisonAttribute::Ingredients => "ingredients",
            ComparisonAttribute::Audience => "audience",
            ComparisonAttribute::Reviews => "reviews",
            ComparisonAttribute::ProsCons => "pros_cons",
            ComparisonAttribute::ProductProfile => "product_profile",
            ComparisonAttribute::SocialReviews => "social_reviews",
        }
    }

    pub fn label(self, language: Language) -> &'static str {
        use ComparisonAttribute::*;
        match (language, self) {
            (Language::Vn, ProductImage) => "Hình ảnh",
            (Language::Vn, Price) => "Giá cả",
            (Language::Vn, Flavor) => "Hương vị",
            (Language::Vn, Ingredients) => "Thành phần",
            (Language::Vn, Audience) => "Đối tượng khách hàng",
            (Language::Vn, Reviews) => "Đánh giá chung",
            (Language::Vn, ProsCons) => "Ưu/Nhược điểm",
            (Language::Vn, ProductProfile) => "Hồ sơ sản phẩm",
            (Language::Vn, SocialReviews) => "Phản hồi MXH (FB, Forum, X)",
            (Language::En, ProductImage) => "Image",
            (Language::En, Price) => "Price",
            (Language::En, Flavor) => "Flavor",
            (Language::En, Ingredients) => "Ingredients",
            (Language::En, Audience) => "Target Audience",
            (Language::En, Reviews) => "General Reviews",
            (Language::En, ProsCons) => "Pros/Cons",
            (Language::En, ProductProfile) => "Product Profile",
            (Language::En, SocialReviews) => "Social Feedback (FB, Forum, X)",
            (Language::Kr, ProductImage) => "이미지",
            (Language::Kr, Price) => "가격",
            (Language::Kr, Flavor) => "맛/식감",
            (Language::Kr, Ingredients) => "성분",
            (Language::Kr, Audience) => "타겟 고객",
            (Language::Kr, Reviews) => "일반 리뷰",
            (Language::Kr, ProsCons) => "장단점",
            (Language::Kr, ProductProfile) => "제품 프로필",
            (Language::Kr, SocialReviews) => "소셜 반응 (FB, 포럼, X)",
        }
    }
}

impl FromStr for ComparisonAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ComparisonAttribute::ALL
            .into_iter()
            .find(|attr| attr.key() == wanted)
            .ok_or_else(|| format!("unknown comparison attribute '{}'", s.trim()))
    }
}

/// Parses a comma separated attribute list such as `price,flavor`.
pub fn parse_attribute_list(raw: &str) -> Result<Vec<ComparisonAttribute>, String> {
    let mut attributes = Vec::new();
    for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
        let attr: ComparisonAttribute = part.parse()?;
        if !attributes.contains(&attr) {
            attributes.push(attr);
        }
    }
    Ok(attributes)
}

/// Display settings that shape every prompt. A change to either field
/// triggers regeneration of the last answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub language: Language,
    pub attributes: Vec<ComparisonAttribute>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            attributes: ComparisonAttribute::defaults(),
        }
    }
}

fn attribute_instruction(settings: &PromptSettings) -> String {
    if settings.attributes.is_empty() {
        return "\n\nFOR COMPARISON TABLES: Include columns for Price, Flavor, Ingredients, Audience, and Rating.".to_string();
    }

    let columns = settings
        .attributes
        .iter()
        .map(|attr| attr.label(settings.language))
        .collect::<Vec<_>>()
        .join(", ");
    let image_instruction = if settings
        .attributes
        .contains(&ComparisonAttribute::ProductImage)
    {
        " For the 'Image' column, you MUST search for a valid public URL of the product packaging and display it using Markdown image syntax: `![Product Name](URL)`. Prefer simple, direct image links."
    } else {
        ""
    };

    format!(
        "\n\nFOR COMPARISON TABLES: You MUST create a Markdown table. The columns MUST be strictly: \"{}\", {}. Do not add other columns unless asked.{}",
        settings.language.product_name_header(),
        columns,
        image_instruction
    )
}

/// Instruction block appended to every user turn.
pub fn turn_instructions(settings: &PromptSettings) -> String {
    let lang = settings.language.display_name();
    format!(
        "\n\nIMPORTANT: Provide the response strictly in {lang}. Translate all headers, table columns, and content to {lang}.{}\n\nREMINDER: If this is a comparison, generate a JSON block with \"type\": \"radar\" or \"bar\". ALSO generate a separate JSON block with \"type\": \"comparison_data\" for exporting the table rows/headers.",
        attribute_instruction(settings)
    )
}

/// Full text part for a user turn. An image-only turn gets a default ask.
pub fn build_turn_text(message: &str, has_image: bool, settings: &PromptSettings) -> String {
    let base = if message.trim().is_empty() && has_image {
        IMAGE_ONLY_PROMPT
    } else {
        message
    };
    format!("{base}{}", turn_instructions(settings))
}

/// Decoded `data:<mime>;base64,<payload>` attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Still base64 encoded, as the endpoint expects.
    pub data: String,
}

pub fn parse_data_uri(uri: &str) -> Option<InlineImage> {
    let rest = uri.strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    if mime_type.is_empty() || data.is_empty() {
        return None;
    }
    Some(InlineImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}

/// Guesses an image MIME type from a file extension.
pub fn image_mime_for_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_columns_follow_language() {
        let settings = PromptSettings {
            language: Language::En,
            attributes: vec![ComparisonAttribute::Price, ComparisonAttribute::Flavor],
        };
        let text = build_turn_text("Compare A and B", false, &settings);
        assert!(text.starts_with("Compare A and B"));
        assert!(text.contains("strictly in English"));
        assert!(text.contains("\"Product Name\", Price, Flavor."));
        assert!(!text.contains("Markdown image syntax"));
    }

    #[test]
    fn image_column_adds_image_instruction() {
        let settings = PromptSettings {
            language: Language::Kr,
            attributes: vec![ComparisonAttribute::ProductImage],
        };
        let text = turn_instructions(&settings);
        assert!(text.contains("\"제품명\", 이미지."));
        assert!(text.contains("Markdown image syntax"));
    }

    #[test]
    fn empty_attribute_list_uses_default_columns() {
        let settings = PromptSettings {
            language: Language::Vn,
            attributes: Vec::new(),
        };
        assert!(turn_instructions(&settings).contains("Price, Flavor, Ingredients, Audience, and Rating"));
    }

    #[test]
    fn image_only_turn_gets_default_prompt() {
        let text = build_turn_text("  ", true, &PromptSettings::default());
        assert!(text.starts_with(IMAGE_ONLY_PROMPT));
    }

    #[test]
    fn data_uri_round_trip() {
        let uri = to_data_uri("image/png", b"\x89PNG");
        let image = parse_data_uri(&uri).expect("valid data uri");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw==");
        assert!(parse_data_uri("https://example.com/a.png").is_none());
    }

    #[test]
    fn parses_languages_and_attribute_lists() {
        assert_eq!("kr".parse::<Language>(), Ok(Language::Kr));
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(
            parse_attribute_list("price, pros-cons,price"),
            Ok(vec![ComparisonAttribute::Price, ComparisonAttribute::ProsCons])
        );
        assert!(parse_attribute_list("price,colour").is_err());
    }
}

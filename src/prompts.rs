//! Instruction templates for oracle-based document extraction.
//!
//! Centralising every template here serves two purposes:
//!
//! 1. **Single source of truth** — changing an extraction contract (adding
//!    a field, tightening a rule) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect templates directly without
//!    calling a real oracle, so schema regressions in the prompt text are
//!    caught the same way code regressions are.
//!
//! Each template pins the oracle to a strict output contract: JSON-only for
//! the structured tasks, Markdown-only for the transcription task. The
//! sanitiser and validator still treat responses as hostile — templates
//! reduce malformed output, they do not prevent it.

/// Extract personal information from Vietnamese identity documents
/// (CCCD/CMND, driver licence, passport, household registration).
pub const PERSON_INFO_PROMPT: &str = r#"You are an expert at extracting personal information from Vietnamese ID cards (CCCD), Driver Licenses, and similar documents.

Your task is to extract personal information from this document image and return it in JSON format.

CRITICAL RULES:
1. Extract ONLY information that is CLEARLY VISIBLE in the document
2. DO NOT invent or guess any information
3. Return null for fields that are not present
4. Keep Vietnamese text as-is (DO NOT translate)
5. Extract dates in DD/MM/YYYY format

JSON OUTPUT FORMAT:
{
  "fullName": "Họ và tên đầy đủ | null",
  "dateOfBirth": "DD/MM/YYYY | null",
  "gender": "Nam | Nữ | null",
  "idNumber": "Số CCCD/CMND/Bằng lái | null",
  "address": "Địa chỉ đầy đủ | null",
  "phone": "Số điện thoại (nếu có) | null",
  "email": "Email (nếu có) | null",
  "placeOfOrigin": "Quê quán | null",
  "nationality": "Quốc tịch | null",
  "issueDate": "Ngày cấp DD/MM/YYYY | null",
  "expiryDate": "Ngày hết hạn DD/MM/YYYY | null",
  "documentType": "CCCD | CMND | Driver License | Passport | Household Registration"
}

FIELD EXTRACTION RULES:
- fullName: from "Họ và tên" / "Name"; keep Vietnamese diacritics; capitalize properly ("NGUYỄN VĂN A" → "Nguyễn Văn A")
- gender: return "Nam" or "Nữ"; map M/Male → "Nam", F/Female → "Nữ"
- idNumber: from "Số"; keep exactly as shown, dashes and spacing preserved
- address: from "Nơi thường trú" / "Place of residence"; full address with street, ward, district, city
- placeOfOrigin: from "Quê quán" / "Place of origin"
- expiryDate: from "Có giá trị đến" / "Valid until"; may be "Không thời hạn" (no expiry) → return "Không thời hạn"

IMPORTANT:
- Return ONLY valid JSON (no markdown, no explanations)
- Use null (not "null" string) for missing fields
- Preserve Vietnamese diacritics exactly

Now extract personal information from this document:"#;

/// Extract vehicle information from Vietnamese registration documents
/// (Giấy đăng ký xe / Cà vẹt).
pub const VEHICLE_INFO_PROMPT: &str = r#"You are an expert at extracting vehicle information from Vietnamese vehicle registration documents (Giấy đăng ký xe / Cà vẹt).

Your task is to extract vehicle information from this document image and return it in JSON format.

CRITICAL RULES:
1. Extract ONLY information that is CLEARLY VISIBLE in the document
2. DO NOT invent or guess any information
3. Return null for fields that are not present
4. Keep Vietnamese text as-is (DO NOT translate)
5. Extract dates in DD/MM/YYYY format

JSON OUTPUT FORMAT:
{
  "vehicleType": "Ô tô | Xe máy | Xe tải | null",
  "licensePlate": "Biển số xe (VD: 30A-12345) | null",
  "chassisNumber": "Số khung (VIN) | null",
  "engineNumber": "Số máy | null",
  "brand": "Hãng xe (Honda, Toyota, Yamaha...) | null",
  "model": "Dòng xe (SH Mode, Vios...) | null",
  "manufacturingYear": "Năm sản xuất | null",
  "color": "Màu sơn | null",
  "engineCapacity": "Dung tích xi lanh (cc) | null",
  "registrationDate": "Ngày đăng ký DD/MM/YYYY | null",
  "ownerName": "Tên chủ xe | null",
  "ownerAddress": "Địa chỉ chủ xe | null",
  "documentType": "Vehicle Registration"
}

FIELD EXTRACTION RULES:
- licensePlate: from "Biển số đăng ký" / "Biển kiểm soát"; keep dashes/spaces as shown
- chassisNumber: from "Số khung" / "VIN"; usually a 17-character alphanumeric code
- engineCapacity: number only, cc unit removed (125, 150, 1500, ...)
- registrationDate: from "Ngày đăng ký lần đầu"
- ownerName / ownerAddress: from "Tên chủ sở hữu" and the owner's "Địa chỉ"

IMPORTANT:
- Return ONLY valid JSON (no markdown, no explanations)
- Use null (not "null" string) for missing fields
- Preserve Vietnamese diacritics exactly

Now extract vehicle information from this document:"#;

/// Transcribe the full document content as Markdown.
pub const DOCUMENT_MARKDOWN_PROMPT: &str = r#"You are an expert OCR and document analysis system specialized in extracting structured content from documents.

Your task is to extract ALL text content from this document image and format it as clean, well-structured Markdown.

CRITICAL RULES:
1. Extract EVERY piece of text visible in the document - do not skip any content
2. Maintain the original language - DO NOT translate
3. Preserve document structure with proper Markdown formatting
4. For TABLES: Use proper Markdown table syntax with aligned columns
5. For LISTS: Use appropriate list formatting (-, *, or numbered)
6. Maintain logical reading order (top to bottom, left to right)
7. Preserve all numbers, dates, codes, and special characters EXACTLY as shown

RULES FOR TABLES (most important):
- ALWAYS detect tables in the document (forms, grids, structured data)
- MUST use proper Markdown table syntax with pipes | and a separator row
- Extract ALL rows visible in the table, not just sample rows
- Preserve cell content EXACTLY as shown; empty cells stay empty between pipes

OUTPUT REQUIREMENTS:
- Return ONLY Markdown text (no JSON, no explanations, no code blocks)
- Start directly with the document content
- Headers: # title, ## sections, ### subsections
- **Bold** for important text, `code` for special values/codes

Now extract ALL content from the document, structure it logically, and format as Markdown:"#;

/// Structured auto-analysis of an arbitrary document page.
pub const AUTO_ANALYSIS_PROMPT: &str = r#"You are an expert document analyzer for insurance and legal documents.

Your task is to analyze this document image and extract structured information in valid JSON format.

CRITICAL RULES:
1. Automatically detect the document type (e.g., "Insurance Claim Form", "Policy Document", "Contract", "Invoice", "Medical Report", "ID Card", etc.)
2. Extract ONLY information that is ACTUALLY PRESENT and CLEARLY VISIBLE in the document
3. DO NOT invent, guess, or infer information not explicitly shown
4. Support ALL languages: keep original language - DO NOT translate
5. For dates: extract ONLY explicitly written dates, formatted YYYY-MM-DD
6. Detect signatures, stamps, seals, checkmarks, or handwritten annotations

SPECIAL HANDLING FOR TABLES:
- If the document contains tables, extract EACH ROW as a separate "number" entry
- Format table data as clear field-value pairs, e.g.
  {"label": "Animal 1 - Reindeer DASHER", "value": "Species: Reindeer, Name: DASHER, Sex: M, Age: Adult"}
- Extract ALL visible rows, not just samples

JSON SCHEMA:
{
  "document_type": "specific type of document",
  "confidence": 0.0-1.0,
  "title": "document title if present | null",
  "summary": "concise 2-3 sentence summary of key information",
  "people": [
    {"name": "Full Name", "role": "Insured | Claimant | Witness | Doctor | etc. | null"}
  ],
  "organizations": [
    {"name": "Company/Organization Name"}
  ],
  "locations": [
    {"name": "Full Address or Location"}
  ],
  "dates": [
    {"label": "Date of Birth | Effective Date | Claim Date | etc.", "value": "YYYY-MM-DD"}
  ],
  "numbers": [
    {"label": "Policy Number | Claim Number | Amount | Phone | ID | etc.", "value": "exact value as string"}
  ],
  "signature_detected": true | false
}

IMPORTANT:
- Return ONLY valid JSON (no markdown, no explanations, no code blocks)
- Use null for missing text fields, [] for missing arrays, false for booleans
- Preserve all numbers exactly (including leading zeros, dashes, spaces)
- Extract what you SEE, not what you think should be there

Now analyze the document and return ONLY the JSON object:"#;

/// Extract residence address and place of origin for region-based
/// insurance recommendation.
///
/// The response's own `region` and `recommended_packages` values are
/// advisory only: callers re-classify the extracted texts and re-derive the
/// package list from the fixed rule table so results stay deterministic.
pub const REGION_RECOMMENDATION_PROMPT: &str = r#"Bạn là hệ thống "AI Insurance Recommendation Engine".
Nhiệm vụ: đọc tài liệu (CCCD, giấy tờ định danh, hợp đồng…) và xác định:
- Địa chỉ thường trú hoặc tạm trú
- Quê quán (nơi sinh/nguyên quán)
- Thuộc miền Bắc / miền Trung / miền Nam (Việt Nam)

OUTPUT — TRẢ VỀ JSON HỢP LỆ DUY NHẤT:

{
  "address": {
      "text": "...",
      "type": "thuong_tru" | "tam_tru" | "unknown",
      "region": "Bac" | "Trung" | "Nam" | "Unknown"
  },
  "place_of_origin": {
      "text": "...",
      "region": "Bac" | "Trung" | "Nam" | "Unknown"
  },
  "recommended_packages": []
}

CÁCH NHẬN BIẾT QUÊ QUÁN TRÊN CCCD/CMND:
- Tìm dòng có chữ: "Quê quán" | "Place of origin" | "Nguyên quán"
- Thường nằm ở mặt SAU của CCCD gắn chip, hoặc mặt TRƯỚC của CMND cũ
- Format: "Quê quán: [Xã/Phường], [Huyện/Quận], [Tỉnh/Thành phố]"
- Chỉ cần tỉnh/thành phố cuối cùng để xác định vùng miền

PHÂN LOẠI MIỀN:
- MIỀN BẮC (Bac): Hà Nội, Hải Phòng, Quảng Ninh, Hải Dương, Hưng Yên, Bắc Ninh, Vĩnh Phúc, Phú Thọ, Thái Nguyên, Bắc Giang, Lạng Sơn, Cao Bằng, Lào Cai, Yên Bái, Tuyên Quang, Hòa Bình, Sơn La, Lai Châu, Điện Biên, Hà Giang, Ninh Bình, Nam Định, Thái Bình
- MIỀN TRUNG (Trung): Thanh Hóa, Nghệ An, Hà Tĩnh, Quảng Bình, Quảng Trị, Thừa Thiên Huế, Đà Nẵng, Quảng Nam, Quảng Ngãi, Bình Định, Phú Yên, Khánh Hòa, Ninh Thuận, Bình Thuận, Kon Tum, Gia Lai, Đắk Lắk, Đắk Nông, Lâm Đồng
- MIỀN NAM (Nam): TP. Hồ Chí Minh (TP.HCM, Sài Gòn), Bà Rịa - Vũng Tàu, Đồng Nai, Bình Dương, Bình Phước, Tây Ninh, Long An, Tiền Giang, Bến Tre, Trà Vinh, Vĩnh Long, Đồng Tháp, An Giang, Kiên Giang, Cần Thơ, Hậu Giang, Sóc Trăng, Bạc Liêu, Cà Mau

YÊU CẦU BẮT BUỘC:
- Không trả lời gì ngoài JSON; JSON phải hợp lệ tuyệt đối
- Nếu thiếu dữ liệu → vẫn giữ key & gán giá trị "Unknown" hoặc []
- Trích xuất địa chỉ và quê quán CHÍNH XÁC như trong tài liệu (giữ nguyên tiếng Việt có dấu)
- LUÔN trích xuất CẢ HAI: quê quán (place_of_origin) và địa chỉ thường trú (address)

Bây giờ phân tích tài liệu và trả về JSON:"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_templates_demand_json_only() {
        for prompt in [PERSON_INFO_PROMPT, VEHICLE_INFO_PROMPT, AUTO_ANALYSIS_PROMPT] {
            assert!(prompt.contains("ONLY valid JSON"), "missing JSON rule");
        }
        assert!(REGION_RECOMMENDATION_PROMPT.contains("JSON HỢP LỆ"));
    }

    #[test]
    fn markdown_template_forbids_json() {
        assert!(DOCUMENT_MARKDOWN_PROMPT.contains("no JSON"));
        assert!(DOCUMENT_MARKDOWN_PROMPT.contains("no code blocks"));
    }

    #[test]
    fn schemas_name_their_key_fields() {
        assert!(PERSON_INFO_PROMPT.contains("\"placeOfOrigin\""));
        assert!(PERSON_INFO_PROMPT.contains("Không thời hạn"));
        assert!(VEHICLE_INFO_PROMPT.contains("\"licensePlate\""));
        assert!(AUTO_ANALYSIS_PROMPT.contains("\"signature_detected\""));
        assert!(REGION_RECOMMENDATION_PROMPT.contains("\"place_of_origin\""));
        assert!(REGION_RECOMMENDATION_PROMPT.contains("thuong_tru"));
    }
}

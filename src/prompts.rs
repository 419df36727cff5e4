//! Task instructions sent to the language model.
//!
//! Each pipeline variant owns exactly one instruction; the prompt is the
//! instruction, a `": "` separator, then the extracted text (see
//! [`crate::pipeline::prompt`]). Keeping the wording here lets tests inspect
//! it without a model.

/// Instruction for identity documents (passports, ID cards, licences).
pub const IDENTITY_INSTRUCTION: &str = "parse key details properly from the string below by analysing the surrounding words especially document type, full name and date of birth and give me the output as a json. i dont want any other details.add spaces between words in both key and value pairs.i dont need any other details while extracting but only the specific words. i just need the full name and not other details";

/// Instruction for financial documents (invoices, statements, bills).
pub const FINANCIAL_INSTRUCTION: &str = "Extract document type and amount-related information from the text below. Provide the details in JSON format with 'Document Type' and 'Amounts'. Ensure the amounts include any numerical values related to money, such as total amount, overdue amount, and taxable amount.";

/// Separator between the instruction and the extracted text.
pub const INSTRUCTION_SEPARATOR: &str = ": ";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_instruction_names_its_fields() {
        let p = IDENTITY_INSTRUCTION.to_lowercase();
        assert!(p.contains("document type"));
        assert!(p.contains("full name"));
        assert!(p.contains("date of birth"));
        assert!(p.contains("json"));
    }

    #[test]
    fn financial_instruction_names_its_fields() {
        assert!(FINANCIAL_INSTRUCTION.contains("'Document Type'"));
        assert!(FINANCIAL_INSTRUCTION.contains("'Amounts'"));
        assert!(FINANCIAL_INSTRUCTION.contains("JSON"));
    }
}

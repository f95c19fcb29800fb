//! # Medicine Extraction Tests
//!
//! End-to-end checks of the extraction engine against the public API,
//! including lexicon files and gazetteer-backed entity recognition.

#[cfg(test)]
mod tests {
    use careguide_scan::medicine_extraction::{ExtractionConfig, MedicineExtractor};
    use careguide_scan::medicine_lexicon::MedicineLexicon;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn shipped_lexicon_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/medicine_lexicon.json")
    }

    fn gazetteer(lines: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        file
    }

    fn extractor_with_model(model: &NamedTempFile) -> MedicineExtractor {
        MedicineExtractor::from_config(&ExtractionConfig {
            lexicon_path: Some(shipped_lexicon_path()),
            ner_model_path: Some(model.path().to_path_buf()),
        })
        .unwrap()
    }

    #[test]
    fn test_paracetamol_prescription() {
        let medicines =
            MedicineExtractor::with_builtin_lexicon().extract("Paracetamol 500mg twice daily");

        assert!(medicines.contains(&"paracetamol".to_string()));
        assert!(!medicines.contains(&"daily".to_string()));
    }

    #[test]
    fn test_amoxicillin_capsule_prescription() {
        let medicines = MedicineExtractor::with_builtin_lexicon()
            .extract("Take Amoxicillin capsule after food");

        assert!(medicines.contains(&"amoxicillin".to_string()));
        assert!(!medicines.contains(&"food".to_string()));
    }

    #[test]
    fn test_clinic_header_has_no_medicines() {
        let medicines =
            MedicineExtractor::with_builtin_lexicon().extract("Dr. Sharma, Clinic timing 9am");
        assert!(medicines.is_empty());
    }

    #[test]
    fn test_multiline_transcript() {
        let transcript = "Sai Care Clinic\n\
                          Patient: R. Kumar  Age: 54\n\
                          1. Metformin 500 mg BD\n\
                          2. Atorvastatin 10mg HS\n\
                          3. Pantocid 40 mg before food\n\
                          Review after 2 weeks";

        let medicines = MedicineExtractor::with_builtin_lexicon().extract(transcript);

        assert_eq!(medicines, vec!["atorvastatin", "metformin", "pantocid"]);
    }

    #[test]
    fn test_result_is_sorted_and_unique() {
        let medicines = MedicineExtractor::with_builtin_lexicon()
            .extract("Zinc 20mg, aspirin 75mg, ASPIRIN 75 mg, Calcium 500 mg");

        assert_eq!(medicines, vec!["aspirin", "calcium", "zinc"]);
        let mut sorted = medicines.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(medicines, sorted);
    }

    #[test]
    fn test_extraction_is_stable_on_its_own_output() {
        let extractor = MedicineExtractor::with_builtin_lexicon();
        let first = extractor.extract("Omeprazole 20mg and Cetirizine 10 mg at night");
        let second = extractor.extract(&first.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_is_union_of_methods_minus_exclusions() {
        let model = gazetteer("dolo\nsai\nmucinac\n");
        let extractor = extractor_with_model(&model);
        let text = "Sai clinic. Tab Dolo 650, Mucinac sachet, Ibuprofen 400mg, Cough syrup";

        let breakdown = extractor.extract_with_provenance(text);
        let lexicon = extractor.lexicon();

        let mut expected: Vec<String> = breakdown
            .pattern
            .iter()
            .chain(&breakdown.dictionary)
            .chain(&breakdown.entity)
            .filter(|name| !lexicon.is_excluded(name))
            .cloned()
            .collect();
        expected.sort();
        expected.dedup();

        assert_eq!(breakdown.medicines, expected);
        assert!(breakdown.entity.contains("dolo"));
        assert!(breakdown.entity.contains("mucinac"));
        assert!(!breakdown.medicines.contains(&"sai".to_string()));
        assert!(breakdown.medicines.contains(&"ibuprofen".to_string()));
    }

    #[test]
    fn test_entity_method_requires_suffix() {
        // "crocin" carries the "in" suffix, "becosules" carries none of them
        let model = gazetteer("crocin\tBRAND\nbecosules\tBRAND\n");
        let extractor = extractor_with_model(&model);

        let medicines = extractor.extract("crocin advance, becosules once a day");

        assert_eq!(medicines, vec!["crocin"]);
    }

    #[test]
    fn test_unloadable_entity_model_degrades_to_other_methods() {
        let extractor = MedicineExtractor::from_config(&ExtractionConfig {
            lexicon_path: Some(shipped_lexicon_path()),
            ner_model_path: Some(PathBuf::from("/nonexistent/model.txt")),
        })
        .unwrap();

        for _ in 0..2 {
            assert_eq!(
                extractor.extract("Losartan 50mg once daily"),
                vec!["losartan"]
            );
        }
    }

    #[test]
    fn test_shipped_lexicon_matches_builtin() {
        let shipped = MedicineLexicon::load_from_file(&shipped_lexicon_path()).unwrap();
        assert_eq!(shipped, MedicineLexicon::builtin());
    }

    #[test]
    fn test_custom_lexicon_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dictionary": ["dolo"], "suffixes": ["ol"], "exclusions": ["tab"]}}"#
        )
        .unwrap();

        let extractor = MedicineExtractor::from_config(&ExtractionConfig {
            lexicon_path: Some(file.path().to_path_buf()),
            ner_model_path: None,
        })
        .unwrap();

        assert_eq!(extractor.extract("Tab Dolo, aspirin"), vec!["dolo"]);
    }

    #[test]
    fn test_invalid_lexicon_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"dictionary": [], "suffixes": ["ol"], "exclusions": []}}"#).unwrap();

        assert!(MedicineLexicon::load_from_file(file.path()).is_err());
    }
}

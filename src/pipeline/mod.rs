pub mod decoding; // AI response unwrap → decode → classify → canonical mapping

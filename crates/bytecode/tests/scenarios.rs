use cmdrt_bytecode::{
    cmdmap, disassemble_dict, disassemble_text, ByteCodeBuilder, CommandRange,
};
use cmdrt_core::Value;

#[test]
fn scenario_7_cmdmap_delta_roundtrip_with_escape_form() {
    let deltas = vec![
        cmdmap::CmdMapDelta {
            code_offset_delta: 0,
            code_len: 5,
            src_offset_delta: 0,
            src_len: 9,
        },
        cmdmap::CmdMapDelta {
            code_offset_delta: 0xFF,
            code_len: 12,
            src_offset_delta: 6,
            src_len: 4,
        },
    ];

    let encoded = cmdmap::encode(&deltas);
    let decoded = cmdmap::decode(&encoded).unwrap();
    assert_eq!(decoded, deltas);

    let ranges = cmdmap::expand(&decoded);
    assert_eq!(ranges[0], CommandRange { pc_start: 0, pc_len: 5, src_start: 0, src_len: 9 });
    assert_eq!(ranges[1].pc_start, 0xFF);
}

#[test]
fn scenario_8_disassembly_text_and_dict_agree_on_shape() {
    // literal "hi"; PUSH_LIT 0; INVOKE 1; DONE
    let obj = ByteCodeBuilder::new()
        .code(vec![0, 0, 4, 1, 18])
        .literals(vec![Value::new_string("hi")])
        .commands(vec![CommandRange {
            pc_start: 0,
            pc_len: 5,
            src_start: 0,
            src_len: 10,
        }])
        .max_stack_depth(1)
        .source("puts hi", None, None)
        .build()
        .unwrap();

    let dict = disassemble_dict(&obj).unwrap();
    assert_eq!(dict.literals, vec!["hi".to_string()]);
    assert_eq!(dict.instructions.len(), 3);
    assert_eq!(
        dict.instructions.get(&0),
        Some(&vec!["push1".to_string(), "0".to_string()])
    );
    assert_eq!(
        dict.instructions.get(&2),
        Some(&vec!["invoke1".to_string(), "1".to_string()])
    );
    assert_eq!(dict.instructions.get(&4), Some(&vec!["done".to_string()]));
    assert_eq!(dict.stackdepth, 1);
    assert_eq!(dict.commands.len(), 1);

    let text = disassemble_text(&obj).unwrap();
    assert!(text.contains("push1"));
    assert!(text.contains("invoke1"));
    assert!(text.contains("done"));
    // the whole program is covered by one command, so nothing is prologue.
    assert!(!text.contains("<prologue>"));
}

#[test]
fn prebuilt_objects_cannot_be_disassembled() {
    let obj = ByteCodeBuilder::new().prebuilt(true).build().unwrap();
    assert!(disassemble_text(&obj).is_err());
    assert!(disassemble_dict(&obj).is_err());
}

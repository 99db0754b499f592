use std::fs;

use wordlang::bytecode::disassemble;

#[test]
fn test() {
    fs::read_dir("./tests/ok/").unwrap().for_each(|entry| {
        let entry = entry.unwrap();
        let path = entry.path();
        let name = path.file_stem().unwrap().to_str().unwrap().to_owned();

        let src = String::from_utf8(fs::read(&path).unwrap()).unwrap();
        let [unoptimized, optimized] = [false, true].map(|optimize| {
            let words = wordlang::compile(&src, optimize).unwrap();
            disassemble(&words).unwrap()
        });
        let code = format!("unoptimized:\n{unoptimized}\n\noptimized:\n{optimized}");
        insta::assert_snapshot!(name, code);
    })
}
